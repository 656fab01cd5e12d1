use crate::error::Result;
use crate::mode::{Mode, SwitchMethod};
use crate::services::gesture_detector::DEFAULT_MAX_GESTURE_DELAY_MS;
use crate::store::SettingsStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub const KEY_DEFAULT_MODE: &str = "default_mode";
pub const KEY_SWITCH_METHOD: &str = "switch_method";
pub const KEY_DISABLED: &str = "disabled";
pub const KEY_EXIT_POLICY: &str = "exit_policy";
pub const KEY_EXIT_MODE: &str = "exit_mode";
pub const KEY_GESTURE_MAX_DELAY: &str = "gesture_max_delay_ms";

/// Что записать в устройство при завершении
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitPolicy {
    /// Оставить текущий режим
    #[default]
    Keep,
    /// Вернуть режим, который был до запуска
    LaunchMode,
    /// Записать фиксированный `exit_mode`
    Fixed,
}

/// Типизированные пользовательские настройки поверх `SettingsStore`
#[derive(Clone)]
pub struct Preferences {
    store: Arc<SettingsStore>,
}

impl Preferences {
    pub fn new(store: Arc<SettingsStore>) -> Self {
        Self { store }
    }

    pub fn default_mode(&self) -> Mode {
        self.store.get_or(KEY_DEFAULT_MODE, Mode::Primary)
    }

    pub fn set_default_mode(&self, mode: Mode) -> Result<bool> {
        self.store.set(KEY_DEFAULT_MODE, &mode)
    }

    pub fn switch_method(&self) -> SwitchMethod {
        self.store.get_or(KEY_SWITCH_METHOD, SwitchMethod::WindowFollow)
    }

    pub fn set_switch_method(&self, method: SwitchMethod) -> Result<bool> {
        self.store.set(KEY_SWITCH_METHOD, &method)
    }

    pub fn is_disabled(&self) -> bool {
        self.store.get_or(KEY_DISABLED, false)
    }

    pub fn set_disabled(&self, disabled: bool) -> Result<bool> {
        self.store.set(KEY_DISABLED, &disabled)
    }

    pub fn exit_policy(&self) -> ExitPolicy {
        self.store.get_or(KEY_EXIT_POLICY, ExitPolicy::Keep)
    }

    pub fn exit_mode(&self) -> Mode {
        self.store.get_or(KEY_EXIT_MODE, Mode::Primary)
    }

    /// Режим для записи при выходе, если политика его требует
    pub fn exit_target(&self, on_launch_mode: Mode) -> Option<Mode> {
        match self.exit_policy() {
            ExitPolicy::Keep => None,
            ExitPolicy::LaunchMode => Some(on_launch_mode),
            ExitPolicy::Fixed => Some(self.exit_mode()),
        }
    }

    pub fn gesture_max_delay(&self) -> Duration {
        Duration::from_millis(self.store.get_or(KEY_GESTURE_MAX_DELAY, DEFAULT_MAX_GESTURE_DELAY_MS))
    }
}
