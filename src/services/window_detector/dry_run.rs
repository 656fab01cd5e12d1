use crate::error::Result;
use crate::events::ForegroundApp;
use crate::services::runtime::EngineInput;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tracing::info;

use super::r#trait::WindowDetectorTrait;

const FAKE_APPS: [&str; 4] = ["terminal", "browser", "editor", "game"];

/// Эмулирует смену приложений каждые 10 секунд
pub struct DryRunDetector {
    sender: mpsc::Sender<EngineInput>,
}

impl DryRunDetector {
    pub fn new(sender: mpsc::Sender<EngineInput>) -> Self {
        Self { sender }
    }

    pub fn fake_app(index: usize) -> ForegroundApp {
        let id = FAKE_APPS[index % FAKE_APPS.len()];
        let mut app = ForegroundApp::new(id).with_location(format!("/usr/bin/{}", id));
        app.title = format!("{} - dry_run", id);
        app
    }

    async fn run_impl(self) -> Result<()> {
        info!("Dry-run режим - WindowDetector работает в режиме эмуляции");

        let mut interval = interval(Duration::from_secs(10));
        for index in 0.. {
            interval.tick().await;

            let app = Self::fake_app(index);
            info!("Dry-run: эмулируем смену приложения на: {}", app);
            if self.sender.send(EngineInput::Foreground(app)).await.is_err() {
                break;
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl WindowDetectorTrait for DryRunDetector {
    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run_impl().await
    }
}
