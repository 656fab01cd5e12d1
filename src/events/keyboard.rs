use crate::services::keycode_map::KeycodeMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Состояние клавиши
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyState {
    Pressed,
    Released,
    Repeat,
}

impl KeyState {
    /// Значение `value` события evdev
    pub fn from_evdev_value(value: i32) -> Option<Self> {
        match value {
            0 => Some(KeyState::Released),
            1 => Some(KeyState::Pressed),
            2 => Some(KeyState::Repeat),
            _ => None,
        }
    }
}

/// Код клавиши (evdev коды)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyCode(pub u16);

impl KeyCode {
    pub fn new(code: u16) -> Self {
        Self(code)
    }

    pub fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match KeycodeMap::get_key_name(self.0) {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "KEY_{}", self.0),
        }
    }
}

/// Сырое событие клавиатуры для детектора жестов
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawKeyEvent {
    pub key_code: KeyCode,
    pub is_key_down: bool,
    pub timestamp: Instant,
}

impl RawKeyEvent {
    pub fn new(key_code: KeyCode, is_key_down: bool, timestamp: Instant) -> Self {
        Self {
            key_code,
            is_key_down,
            timestamp,
        }
    }

    pub fn down(key_code: KeyCode, timestamp: Instant) -> Self {
        Self::new(key_code, true, timestamp)
    }

    pub fn up(key_code: KeyCode, timestamp: Instant) -> Self {
        Self::new(key_code, false, timestamp)
    }

    /// Автоповтор не является переходом клавиши и отбрасывается
    pub fn from_state(key_code: KeyCode, state: KeyState, timestamp: Instant) -> Option<Self> {
        match state {
            KeyState::Pressed => Some(Self::down(key_code, timestamp)),
            KeyState::Released => Some(Self::up(key_code, timestamp)),
            KeyState::Repeat => None,
        }
    }
}

impl fmt::Display for RawKeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({}ms ago)",
            self.key_code,
            if self.is_key_down { "down" } else { "up" },
            self.timestamp.elapsed().as_millis()
        )
    }
}
