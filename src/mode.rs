use serde::{Deserialize, Serialize};
use std::fmt;

/// Режим ряда функциональных клавиш, фактически выставленный на устройстве.
///
/// `Primary`: мультимедийные действия без Fn, `Secondary`: F1..F12 без Fn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Primary,
    Secondary,
}

impl Mode {
    /// Противоположный режим (инволюция)
    pub fn counterpart(self) -> Self {
        match self {
            Mode::Primary => Mode::Secondary,
            Mode::Secondary => Mode::Primary,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Primary => write!(f, "primary"),
            Mode::Secondary => write!(f, "secondary"),
        }
    }
}

/// Настроенное для приложения поведение
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Behavior {
    #[default]
    Inferred,
    PrimaryForced,
    SecondaryForced,
}

impl Behavior {
    pub fn is_inferred(self) -> bool {
        matches!(self, Behavior::Inferred)
    }
}

impl fmt::Display for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Behavior::Inferred => write!(f, "inferred"),
            Behavior::PrimaryForced => write!(f, "primary_forced"),
            Behavior::SecondaryForced => write!(f, "secondary_forced"),
        }
    }
}

impl std::str::FromStr for Behavior {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inferred" | "default" => Ok(Behavior::Inferred),
            "primary" | "primary_forced" => Ok(Behavior::PrimaryForced),
            "secondary" | "secondary_forced" => Ok(Behavior::SecondaryForced),
            other => Err(format!("Неизвестное поведение: {}", other)),
        }
    }
}

/// Способ переключения режима
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchMethod {
    #[default]
    WindowFollow,
    GlobalGesture,
}

impl fmt::Display for SwitchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwitchMethod::WindowFollow => write!(f, "window_follow"),
            SwitchMethod::GlobalGesture => write!(f, "global_gesture"),
        }
    }
}

/// Определить целевой режим по поведению приложения и глобальному режиму по умолчанию.
///
/// Текущий режим устройства намеренно не участвует: результат зависит только от настроек.
pub fn resolve(behavior: Behavior, global_default: Mode) -> Mode {
    match behavior {
        Behavior::Inferred => global_default,
        Behavior::PrimaryForced => Mode::Primary,
        Behavior::SecondaryForced => Mode::Secondary,
    }
}
