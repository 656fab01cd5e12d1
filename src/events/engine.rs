use crate::mode::{Behavior, Mode, SwitchMethod};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Откуда пришло изменение правила
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSource {
    RuleList,
    RunningApps,
    Menu,
    Gesture,
    Command,
    Engine,
}

/// События сессии/питания
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Сессия неактивна или система засыпает
    Inactive,
    /// Сессия снова активна или система проснулась
    Active,
}

/// Операция с устройством, завершившаяся ошибкой
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceOperation {
    Resolve,
    Toggle,
    Command,
    Suspend,
    Resume,
    Exit,
}

impl DeviceOperation {
    /// Сбой виден пользователю, если операцию запросил он сам
    pub fn is_user_visible(self) -> bool {
        matches!(self, DeviceOperation::Toggle | DeviceOperation::Command)
    }
}

/// События, которые движок публикует в EventBus
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    ModeChanged(Mode),
    RuleChanged {
        application_id: String,
        behavior: Behavior,
        source: ChangeSource,
    },
    SwitchMethodChanged(SwitchMethod),
    DefaultModeChanged(Mode),
    EnabledChanged(bool),
    CapabilityChanged(bool),
    DeviceFailure {
        operation: DeviceOperation,
        message: String,
        user_visible: bool,
    },
}

impl fmt::Display for EngineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineEvent::ModeChanged(mode) => write!(f, "режим: {}", mode),
            EngineEvent::RuleChanged {
                application_id,
                behavior,
                source,
            } => write!(f, "правило {} -> {} ({:?})", application_id, behavior, source),
            EngineEvent::SwitchMethodChanged(method) => write!(f, "способ переключения: {}", method),
            EngineEvent::DefaultModeChanged(mode) => write!(f, "режим по умолчанию: {}", mode),
            EngineEvent::EnabledChanged(enabled) => write!(f, "включён: {}", enabled),
            EngineEvent::CapabilityChanged(granted) => write!(f, "доступ к клавиатуре: {}", granted),
            EngineEvent::DeviceFailure {
                operation, message, ..
            } => write!(f, "сбой устройства ({:?}): {}", operation, message),
        }
    }
}
