use crate::config::Config;
use crate::error::Result;
use crate::events::{ForegroundApp, WindowInfo};
use crate::fkey_error;
use crate::services::runtime::EngineInput;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, warn};

use super::kdotool::KdotoolDetector;
use super::r#trait::WindowDetectorTrait;
use super::sway::SwayDetector;
use super::xdotool::XdotoolDetector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkingMethod {
    Kdotool,
    Xdotool,
    Sway,
}

impl WorkingMethod {
    fn from_mode(mode: &str) -> Option<Self> {
        match mode {
            "kdotool" => Some(Self::Kdotool),
            "xdotool" => Some(Self::Xdotool),
            "sway" => Some(Self::Sway),
            _ => None,
        }
    }

    /// Порядок проверки утилит в зависимости от окружения
    fn candidates() -> Vec<Self> {
        let desktop = std::env::var("XDG_CURRENT_DESKTOP").unwrap_or_default().to_lowercase();
        if std::env::var("SWAYSOCK").is_ok() || desktop.contains("sway") {
            vec![Self::Sway, Self::Xdotool]
        } else if desktop.contains("kde") {
            vec![Self::Kdotool, Self::Xdotool]
        } else {
            vec![Self::Xdotool, Self::Kdotool, Self::Sway]
        }
    }
}

/// Опрашивает активное окно и сообщает движку о смене приложения
pub struct RealWindowDetector {
    sender: mpsc::Sender<EngineInput>,
    polling_interval: Duration,
    forced_method: Option<WorkingMethod>,
    working_method: Option<WorkingMethod>,
    current_app: Option<String>,

    kdotool: KdotoolDetector,
    xdotool: XdotoolDetector,
    sway: SwayDetector,
}

impl RealWindowDetector {
    pub fn new(config: &Config, sender: mpsc::Sender<EngineInput>) -> Self {
        Self {
            sender,
            polling_interval: config.polling_interval(),
            forced_method: WorkingMethod::from_mode(&config.window.detection_mode),
            working_method: None,
            current_app: None,
            kdotool: KdotoolDetector::new(),
            xdotool: XdotoolDetector::new(),
            sway: SwayDetector::new(),
        }
    }

    async fn detect_working_method(&self) -> Result<WorkingMethod> {
        if let Some(method) = self.forced_method {
            return Ok(method);
        }

        for method in WorkingMethod::candidates() {
            let works = match method {
                WorkingMethod::Kdotool => self.kdotool.test().await,
                WorkingMethod::Xdotool => self.xdotool.test().await,
                WorkingMethod::Sway => self.sway.test().await,
            };
            match works {
                Ok(()) => {
                    info!("Используем {:?} для детекции окон", method);
                    return Ok(method);
                }
                Err(e) => debug!("{:?} не работает: {}", method, e),
            }
        }

        Err(fkey_error!(service_unavailable, "Ни один метод детекции окон не работает"))
    }

    async fn get_window_by_method(&self, method: WorkingMethod) -> Result<WindowInfo> {
        match method {
            WorkingMethod::Kdotool => self.kdotool.get_active_window().await,
            WorkingMethod::Xdotool => self.xdotool.get_active_window().await,
            WorkingMethod::Sway => self.sway.get_active_window().await,
        }
    }

    async fn run_impl(mut self) -> Result<()> {
        info!("RealWindowDetector запущен (интервал {:?})", self.polling_interval);
        let mut interval = interval(self.polling_interval);

        loop {
            interval.tick().await;

            let method = match self.working_method {
                Some(method) => method,
                None => match self.detect_working_method().await {
                    Ok(method) => *self.working_method.insert(method),
                    Err(e) => {
                        error!("{}. Повторная попытка через 10 секунд", e);
                        tokio::time::sleep(Duration::from_secs(10)).await;
                        continue;
                    }
                },
            };

            let window = match self.get_window_by_method(method).await {
                Ok(window) => window,
                Err(e) => {
                    warn!("Метод {:?} перестал работать: {}. Переопределяем...", method, e);
                    self.working_method = None;
                    continue;
                }
            };

            let Some(app) = ForegroundApp::from_window(&window) else {
                debug!("Не удалось определить приложение окна: {}", window);
                continue;
            };

            if self.current_app.as_deref() == Some(app.application_id.as_str()) {
                continue;
            }

            info!("Смена приложения на переднем плане: {}", app);
            self.current_app = Some(app.application_id.clone());
            if self.sender.send(EngineInput::Foreground(app)).await.is_err() {
                return Ok(());
            }
        }
    }
}

#[async_trait::async_trait]
impl WindowDetectorTrait for RealWindowDetector {
    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run_impl().await
    }
}
