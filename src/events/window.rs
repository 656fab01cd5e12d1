use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Информация об окне
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowInfo {
    pub title: String,
    pub class: String,
    pub pid: Option<u32>,
}

impl WindowInfo {
    pub fn new(title: String) -> Self {
        Self {
            title,
            class: String::new(),
            pid: None,
        }
    }

    pub fn with_class(mut self, class: String) -> Self {
        self.class = class;
        self
    }

    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }
}

impl fmt::Display for WindowInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.class.is_empty() {
            write!(f, "\"{}\"", self.title)
        } else {
            write!(f, "\"{}\" ({})", self.title, self.class)
        }
    }
}

/// Приложение на переднем плане, как его видит движок
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForegroundApp {
    pub application_id: String,
    pub bundle_location: Option<PathBuf>,
    pub title: String,
}

impl ForegroundApp {
    pub fn new(application_id: impl Into<String>) -> Self {
        Self {
            application_id: application_id.into(),
            bundle_location: None,
            title: String::new(),
        }
    }

    pub fn with_location(mut self, location: impl Into<PathBuf>) -> Self {
        self.bundle_location = Some(location.into());
        self
    }

    /// Построить идентичность приложения по окну.
    ///
    /// Идентификатор: класс окна; если класс пуст, используется имя исполняемого файла.
    /// Возвращает `None`, если приложение не удаётся идентифицировать.
    pub fn from_window(window: &WindowInfo) -> Option<Self> {
        Self::from_window_with_proc(window, Path::new("/proc"))
    }

    fn from_window_with_proc(window: &WindowInfo, proc_root: &Path) -> Option<Self> {
        let location = window
            .pid
            .and_then(|pid| std::fs::read_link(proc_root.join(pid.to_string()).join("exe")).ok());

        let class = window.class.trim();
        let application_id = if !class.is_empty() && class != "Unknown" {
            class.to_lowercase()
        } else {
            location
                .as_ref()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                .map(|n| n.to_string())?
        };

        Some(Self {
            application_id,
            bundle_location: location,
            title: window.title.clone(),
        })
    }
}

impl fmt::Display for ForegroundApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.bundle_location {
            Some(path) => write!(f, "{} [{}]", self.application_id, path.display()),
            None => write!(f, "{}", self.application_id),
        }
    }
}
