//! Сохраняемое состояние пользователя: настройки и правила приложений.

pub mod preferences;
pub mod rules;
pub mod settings;

pub use preferences::Preferences;
pub use rules::RuleStore;
pub use settings::{FileBackend, MemoryBackend, SettingsBackend, SettingsStore};
