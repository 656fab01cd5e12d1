use crate::services::keycode_map::KeycodeMap;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub device: DeviceConfig,
    pub input: InputConfig,
    pub window: WindowConfig,
    pub capability: CapabilityConfig,
    pub state: StateConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
            filter: "fkey_switcher=info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Параметр модуля hid_apple, через который переключается режим
    pub fnmode_path: PathBuf,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            fnmode_path: PathBuf::from("/sys/module/hid_apple/parameters/fnmode"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InputConfig {
    /// "auto" или путь к /dev/input/eventN
    pub device_path: String,
    pub trigger_key: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            device_path: "auto".to_string(),
            trigger_key: "fn".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WindowConfig {
    /// auto | xdotool | kdotool | sway
    pub detection_mode: String,
    pub polling_interval_ms: u64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            detection_mode: "auto".to_string(),
            polling_interval_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CapabilityConfig {
    pub ungranted_poll_ms: u64,
    pub granted_poll_ms: u64,
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            ungranted_poll_ms: 2000,
            granted_poll_ms: 6000,
        }
    }
}

impl CapabilityConfig {
    pub fn poll_interval(&self, granted: bool) -> Duration {
        Duration::from_millis(if granted {
            self.granted_poll_ms
        } else {
            self.ungranted_poll_ms
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StateConfig {
    /// Файл правил и настроек; по умолчанию в каталоге данных пользователя
    pub path: Option<PathBuf>,
}

impl Config {
    /// Значения по умолчанию, затем TOML-файл (если есть), затем переменные `FKEY_SECTION__KEY`
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("FKEY_").split("__"));

        let config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "full" | "compact" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        match self.window.detection_mode.as_str() {
            "auto" | "xdotool" | "kdotool" | "sway" => {}
            _ => anyhow::bail!("Неверный режим детекции окон: {}", self.window.detection_mode),
        }

        if self.window.polling_interval_ms < 100 {
            anyhow::bail!("polling_interval_ms должно быть минимум 100");
        }

        if self.capability.ungranted_poll_ms == 0 || self.capability.granted_poll_ms == 0 {
            anyhow::bail!("Интервалы опроса доступа должны быть больше 0");
        }

        self.trigger_keycode()?;
        Ok(())
    }

    /// Код клавиши-триггера жеста
    pub fn trigger_keycode(&self) -> Result<u16> {
        KeycodeMap::get_keycode(&self.input.trigger_key)
            .map_err(|e| anyhow::anyhow!("Неверная клавиша-триггер: {}", e))
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.window.polling_interval_ms)
    }
}
