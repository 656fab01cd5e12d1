use crate::config::Config;
use crate::error::{FkeyError, Result};
use crate::events::{KeyCode, KeyState, RawKeyEvent};
use crate::services::gesture_detector::{Gesture, GestureDetector};
use crate::services::runtime::EngineInput;
use crate::trace_if_enabled;
use crate::utils::DeviceFinder;
use evdev::{Device, EventType};
use std::path::PathBuf;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::r#trait::KeyboardListenerTrait;

/// Пассивный слушатель клавиатуры: устройство не захватывается,
/// события остаются доступны остальной системе
pub struct RealKeyboardListener {
    device_path: PathBuf,
    detector: GestureDetector,
    sender: mpsc::Sender<EngineInput>,
}

impl RealKeyboardListener {
    pub fn new(config: &Config, detector: GestureDetector, sender: mpsc::Sender<EngineInput>) -> Result<Self> {
        info!("Инициализация RealKeyboardListener");
        let device_path = DeviceFinder::find_keyboard_device(&config.input.device_path)?;

        Ok(Self {
            device_path,
            detector,
            sender,
        })
    }

    async fn run_impl(mut self) -> Result<()> {
        let device = Device::open(&self.device_path).map_err(|e| {
            FkeyError::DeviceNotFound(format!("Не удалось открыть устройство {:?}: {}", self.device_path, e))
        })?;
        info!(
            "RealKeyboardListener слушает {} ({:?}), триггер {}",
            device.name().unwrap_or("Unknown"),
            self.device_path,
            self.detector.trigger()
        );

        let mut events = device.into_event_stream()?;

        loop {
            let event = match events.next_event().await {
                Ok(event) => event,
                Err(e) => {
                    warn!("Устройство {:?} больше не читается: {}", self.device_path, e);
                    return Err(FkeyError::Io(e));
                }
            };

            if event.event_type() != EventType::KEY {
                continue;
            }

            // автоповтор (value == 2) не является переходом клавиши
            let Some(raw) = KeyState::from_evdev_value(event.value())
                .and_then(|state| RawKeyEvent::from_state(KeyCode::new(event.code()), state, Instant::now()))
            else {
                continue;
            };
            trace_if_enabled!("Событие клавиши: {}", raw);

            if let Some(Gesture::ToggleRequested) = self.detector.handle(&raw) {
                info!("Жест переключения распознан");
                if self.sender.send(EngineInput::ToggleRequested).await.is_err() {
                    return Ok(());
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl KeyboardListenerTrait for RealKeyboardListener {
    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run_impl().await
    }
}
