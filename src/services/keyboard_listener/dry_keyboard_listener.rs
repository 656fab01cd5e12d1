use crate::error::Result;
use crate::events::RawKeyEvent;
use crate::services::gesture_detector::{Gesture, GestureDetector};
use crate::services::runtime::EngineInput;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::info;

use super::r#trait::KeyboardListenerTrait;

const TAP_PERIOD: Duration = Duration::from_secs(15);
const TAP_HOLD: Duration = Duration::from_millis(120);

/// Эмулирует короткое нажатие триггера каждые 15 секунд
pub struct DryRunKeyboardListener {
    detector: GestureDetector,
    sender: mpsc::Sender<EngineInput>,
}

impl DryRunKeyboardListener {
    pub fn new(detector: GestureDetector, sender: mpsc::Sender<EngineInput>) -> Self {
        info!("Инициализация DryRunKeyboardListener");
        Self { detector, sender }
    }

    async fn run_impl(mut self) -> Result<()> {
        info!("Dry-run режим - KeyboardListener эмулирует жест каждые {:?}", TAP_PERIOD);
        let trigger = self.detector.trigger();

        loop {
            tokio::time::sleep(TAP_PERIOD).await;

            let pressed = Instant::now();
            self.detector.handle(&RawKeyEvent::down(trigger, pressed));
            let released = pressed + TAP_HOLD;

            if let Some(Gesture::ToggleRequested) = self.detector.handle(&RawKeyEvent::up(trigger, released)) {
                info!("[DRY RUN] Эмулирован жест переключения");
                if self.sender.send(EngineInput::ToggleRequested).await.is_err() {
                    return Ok(());
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl KeyboardListenerTrait for DryRunKeyboardListener {
    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run_impl().await
    }
}
