use crate::config::Config;
use crate::error::Result;
use crate::events::KeyCode;
use crate::services::gesture_detector::GestureDetector;
use crate::services::runtime::EngineInput;
use std::time::Duration;
use tokio::sync::mpsc;

/// Trait for keyboard listeners that can run in different modes
#[async_trait::async_trait]
pub trait KeyboardListenerTrait {
    /// Читать события, пока подписка активна; завершение означает потерю устройства
    async fn run(self: Box<Self>) -> Result<()>;
}

/// Factory function to create an appropriate keyboard listener based on the dry_run flag
pub fn create_keyboard_listener(
    config: &Config,
    sender: mpsc::Sender<EngineInput>,
    max_delay: Duration,
    dry_run: bool,
) -> Result<Box<dyn KeyboardListenerTrait + Send>> {
    let detector = GestureDetector::new(KeyCode::new(config.trigger_keycode()?), max_delay);

    if dry_run {
        Ok(Box::new(super::dry_keyboard_listener::DryRunKeyboardListener::new(
            detector, sender,
        )))
    } else {
        Ok(Box::new(super::keyboard_listener::RealKeyboardListener::new(
            config, detector, sender,
        )?))
    }
}
