use crate::config::Config;
use crate::error::DeviceError;
use crate::mode::Mode;
use parking_lot::Mutex;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, info};

/// Доступ к текущему режиму функциональных клавиш.
///
/// Запись дорогая: вызывать её только когда цель отличается от последнего
/// записанного режима. Успешный `write` возвращает режим, прочитанный обратно.
pub trait DeviceGateway: Send + Sync {
    fn read(&self) -> Result<Mode, DeviceError>;
    fn write(&self, mode: Mode) -> Result<Mode, DeviceError>;
}

/// Factory function to create an appropriate gateway based on the dry_run flag
pub fn create_device_gateway(config: &Config, dry_run: bool) -> Box<dyn DeviceGateway> {
    if dry_run {
        Box::new(DryRunGateway::new(Mode::Primary))
    } else {
        Box::new(SysfsFnModeGateway::new(&config.device.fnmode_path))
    }
}

/// Параметр `fnmode` модуля `hid_apple`: 1 = мультимедиа первыми, 2 = F-клавиши первыми
pub struct SysfsFnModeGateway {
    path: PathBuf,
}

impl SysfsFnModeGateway {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        info!("Инициализация SysfsFnModeGateway ({:?})", path);
        Self { path }
    }

    fn mode_from_value(raw: &str) -> Option<Mode> {
        match raw.trim() {
            "1" => Some(Mode::Primary),
            "2" => Some(Mode::Secondary),
            _ => None,
        }
    }

    fn value_for_mode(mode: Mode) -> &'static str {
        match mode {
            Mode::Primary => "1",
            Mode::Secondary => "2",
        }
    }

    fn classify(&self, e: std::io::Error, failure: fn(String) -> DeviceError) -> DeviceError {
        match e.kind() {
            ErrorKind::NotFound => DeviceError::PortUnavailable(format!(
                "{} не существует (модуль hid_apple не загружен?)",
                self.path.display()
            )),
            ErrorKind::PermissionDenied => DeviceError::ServiceUnavailable(format!(
                "нет доступа к {}: {}",
                self.path.display(),
                e
            )),
            _ => failure(format!("{}: {}", self.path.display(), e)),
        }
    }
}

impl DeviceGateway for SysfsFnModeGateway {
    fn read(&self) -> Result<Mode, DeviceError> {
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|e| self.classify(e, DeviceError::ReadFailure))?;

        Self::mode_from_value(&raw).ok_or_else(|| {
            DeviceError::ReadFailure(format!("неподдерживаемое значение fnmode: '{}'", raw.trim()))
        })
    }

    fn write(&self, mode: Mode) -> Result<Mode, DeviceError> {
        debug!("Запись fnmode={} ({})", Self::value_for_mode(mode), mode);
        std::fs::write(&self.path, Self::value_for_mode(mode))
            .map_err(|e| self.classify(e, DeviceError::WriteFailure))?;

        self.read().map_err(|e| DeviceError::WriteFailure(format!("проверка после записи: {}", e)))
    }
}

/// Эмуляция устройства для режима сухого запуска
pub struct DryRunGateway {
    mode: Mutex<Mode>,
}

impl DryRunGateway {
    pub fn new(initial: Mode) -> Self {
        info!("Dry-run режим - устройство эмулируется (начальный режим: {})", initial);
        Self {
            mode: Mutex::new(initial),
        }
    }
}

impl DeviceGateway for DryRunGateway {
    fn read(&self) -> Result<Mode, DeviceError> {
        Ok(*self.mode.lock())
    }

    fn write(&self, mode: Mode) -> Result<Mode, DeviceError> {
        info!("[DRY RUN] Режим устройства: {}", mode);
        *self.mode.lock() = mode;
        Ok(mode)
    }
}
