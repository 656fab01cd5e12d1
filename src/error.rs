use thiserror::Error;

/// Ошибки обращения к устройству режима функциональных клавиш
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Порт устройства недоступен: {0}")]
    PortUnavailable(String),

    #[error("Сервис устройства недоступен: {0}")]
    ServiceUnavailable(String),

    #[error("Не удалось прочитать режим устройства: {0}")]
    ReadFailure(String),

    #[error("Не удалось записать режим устройства: {0}")]
    WriteFailure(String),
}

#[derive(Error, Debug)]
pub enum FkeyError {
    #[error("Ошибка конфигурации: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ошибка D-Bus: {0}")]
    DBus(#[from] zbus::Error),

    #[error("Ошибка разбора состояния: {0}")]
    StateParse(#[from] toml::de::Error),

    #[error("Ошибка сериализации состояния: {0}")]
    StateSerialize(#[from] toml::ser::Error),

    #[error("Ошибка устройства: {0}")]
    Device(#[from] DeviceError),

    #[error("Устройство не найдено: {0}")]
    DeviceNotFound(String),

    #[error("Недостаточно прав доступа: {0}")]
    Permission(String),

    #[error("Сервис недоступен: {0}")]
    ServiceUnavailable(String),

    #[error("Канал закрыт: {0}")]
    Channel(String),

    #[error("Внутренняя ошибка: {0}")]
    Internal(String),
}

impl FkeyError {
    pub fn device_not_found<T>(msg: impl Into<String>) -> Result<T> {
        Err(FkeyError::DeviceNotFound(msg.into()))
    }

    /// Ошибка устройства, если она есть
    pub fn as_device_error(&self) -> Option<&DeviceError> {
        match self {
            FkeyError::Device(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, FkeyError>;

// Удобные макросы для создания ошибок
#[macro_export]
macro_rules! fkey_error {
    (channel, $($arg:tt)*) => {
        $crate::error::FkeyError::Channel(format!($($arg)*))
    };
    (device_not_found, $($arg:tt)*) => {
        $crate::error::FkeyError::DeviceNotFound(format!($($arg)*))
    };
    (permission, $($arg:tt)*) => {
        $crate::error::FkeyError::Permission(format!($($arg)*))
    };
    (service_unavailable, $($arg:tt)*) => {
        $crate::error::FkeyError::ServiceUnavailable(format!($($arg)*))
    };
    (internal, $($arg:tt)*) => {
        $crate::error::FkeyError::Internal(format!($($arg)*))
    };
}
