use crate::config::Config;
use crate::error::Result;
use crate::services::runtime::EngineInput;
use tokio::sync::mpsc;

/// Trait for window detectors that can run in different modes
#[async_trait::async_trait]
pub trait WindowDetectorTrait {
    /// Отслеживать приложение на переднем плане; первое известное приложение отправляется сразу
    async fn run(self: Box<Self>) -> Result<()>;
}

/// Factory function to create an appropriate window detector based on the dry_run flag
pub fn create_window_detector(
    config: &Config,
    sender: mpsc::Sender<EngineInput>,
    dry_run: bool,
) -> Box<dyn WindowDetectorTrait + Send> {
    if dry_run {
        Box::new(super::dry_run::DryRunDetector::new(sender))
    } else {
        Box::new(super::window_detector::RealWindowDetector::new(config, sender))
    }
}
