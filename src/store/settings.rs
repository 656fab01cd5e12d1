use crate::error::{FkeyError, Result};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Хранилище документа состояния.
///
/// Реализации читают и пишут документ целиком; типизированный доступ и проверка
/// изменений находятся в [`SettingsStore`].
pub trait SettingsBackend: Send + Sync {
    fn read(&self) -> Result<toml::Table>;
    fn write(&self, document: &toml::Table) -> Result<()>;
}

/// TOML-файл на диске; заменяется атомарно через временный файл рядом
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Путь по умолчанию: `$XDG_DATA_HOME/fkey-switcher/state.toml`
    pub fn default_path() -> Result<PathBuf> {
        directories::ProjectDirs::from("", "", "fkey-switcher")
            .map(|dirs| dirs.data_dir().join("state.toml"))
            .ok_or_else(|| FkeyError::Internal("Не удалось определить домашний каталог".to_string()))
    }
}

impl SettingsBackend for FileBackend {
    fn read(&self) -> Result<toml::Table> {
        if !self.path.exists() {
            debug!("Файл состояния {:?} ещё не создан", self.path);
            return Ok(toml::Table::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(toml::from_str(&content)?)
    }

    fn write(&self, document: &toml::Table) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(document)?;
        let tmp = self.path.with_extension("toml.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!("Состояние сохранено в {:?}", self.path);
        Ok(())
    }
}

/// Документ в памяти для сухого запуска и тестов
#[derive(Default)]
pub struct MemoryBackend {
    document: Mutex<toml::Table>,
    writes: AtomicUsize,
}

impl MemoryBackend {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(document: toml::Table) -> Self {
        Self {
            document: Mutex::new(document),
            writes: AtomicUsize::new(0),
        }
    }

    #[cfg(test)]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub fn document(&self) -> toml::Table {
        self.document.lock().clone()
    }
}

impl SettingsBackend for MemoryBackend {
    fn read(&self) -> Result<toml::Table> {
        Ok(self.document.lock().clone())
    }

    fn write(&self, document: &toml::Table) -> Result<()> {
        *self.document.lock() = document.clone();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl<T: SettingsBackend + ?Sized> SettingsBackend for Arc<T> {
    fn read(&self) -> Result<toml::Table> {
        (**self).read()
    }

    fn write(&self, document: &toml::Table) -> Result<()> {
        (**self).write(document)
    }
}

/// Типизированный доступ к сохранённому документу по ключам.
///
/// Записи упорядочены блокировкой документа; `set` с неизменным значением
/// не выполняет ввода-вывода.
pub struct SettingsStore {
    backend: Box<dyn SettingsBackend>,
    document: Mutex<toml::Table>,
}

impl SettingsStore {
    /// Загрузить документ; нечитаемый файл заменяется пустым документом
    pub fn open(backend: Box<dyn SettingsBackend>) -> Self {
        let document = match backend.read() {
            Ok(document) => document,
            Err(e) => {
                warn!("Не удалось прочитать состояние: {}. Используются значения по умолчанию", e);
                toml::Table::new()
            }
        };
        Self {
            backend,
            document: Mutex::new(document),
        }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.document.lock().get(key).cloned()?;
        match value.try_into::<T>() {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!("Некорректное значение '{}' в состоянии: {}", key, e);
                None
            }
        }
    }

    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Сырые значения (для поэлементной загрузки коллекций)
    pub fn get_raw(&self, key: &str) -> Option<toml::Value> {
        self.document.lock().get(key).cloned()
    }

    /// Перечитать документ из хранилища (файл мог изменить другой процесс)
    pub fn refresh(&self) {
        let mut document = self.document.lock();
        self.refresh_locked(&mut document);
    }

    fn refresh_locked(&self, document: &mut toml::Table) {
        match self.backend.read() {
            Ok(fresh) => *document = fresh,
            Err(e) => warn!("Не удалось перечитать состояние, используется кэш: {}", e),
        }
    }

    /// Записать значение поверх свежей копии документа.
    ///
    /// Возвращает `true`, если документ изменился и был сохранён. Остальные ключи
    /// берутся с диска, поэтому чужие изменения не затираются.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<bool> {
        let value = toml::Value::try_from(value)?;
        let mut document = self.document.lock();
        self.refresh_locked(&mut document);
        if document.get(key) == Some(&value) {
            return Ok(false);
        }

        let previous = document.insert(key.to_string(), value);
        if let Err(e) = self.backend.write(&document) {
            match previous {
                Some(old) => document.insert(key.to_string(), old),
                None => document.remove(key),
            };
            return Err(e);
        }
        Ok(true)
    }
}
