use crate::error::Result;
use crate::events::SessionEvent;
use crate::services::runtime::EngineInput;
use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use zbus::{proxy, Connection};

#[proxy(
    interface = "org.freedesktop.login1.Manager",
    default_service = "org.freedesktop.login1",
    default_path = "/org/freedesktop/login1"
)]
trait LoginManager {
    /// `start == true` перед сном, `false` после пробуждения
    #[zbus(signal)]
    fn prepare_for_sleep(&self, start: bool) -> zbus::Result<()>;
}

#[proxy(
    interface = "org.freedesktop.login1.Session",
    default_service = "org.freedesktop.login1",
    default_path = "/org/freedesktop/login1/session/auto"
)]
trait LoginSession {
    #[zbus(property)]
    fn active(&self) -> zbus::Result<bool>;
}

#[async_trait]
pub trait SessionMonitorTrait {
    async fn run(self: Box<Self>) -> Result<()>;
}

/// Factory function to create an appropriate monitor based on the dry_run flag
pub fn create_session_monitor(
    sender: mpsc::Sender<EngineInput>,
    dry_run: bool,
) -> Box<dyn SessionMonitorTrait + Send> {
    if dry_run {
        Box::new(DrySessionMonitor)
    } else {
        Box::new(LogindSessionMonitor::new(sender))
    }
}

/// Сон и смена активной сессии через systemd-logind
pub struct LogindSessionMonitor {
    sender: mpsc::Sender<EngineInput>,
}

impl LogindSessionMonitor {
    pub fn new(sender: mpsc::Sender<EngineInput>) -> Self {
        Self { sender }
    }

    pub fn sleep_event(start: bool) -> SessionEvent {
        if start {
            SessionEvent::Inactive
        } else {
            SessionEvent::Active
        }
    }

    pub fn activity_event(active: bool) -> SessionEvent {
        if active {
            SessionEvent::Active
        } else {
            SessionEvent::Inactive
        }
    }

    async fn send(&self, event: SessionEvent) -> bool {
        debug!("Событие сессии: {:?}", event);
        self.sender.send(EngineInput::Session(event)).await.is_ok()
    }
}

#[async_trait]
impl SessionMonitorTrait for LogindSessionMonitor {
    async fn run(self: Box<Self>) -> Result<()> {
        let connection = Connection::system().await?;
        let manager = LoginManagerProxy::new(&connection).await?;
        let session = LoginSessionProxy::new(&connection).await?;

        let mut sleep_signals = manager.receive_prepare_for_sleep().await?;
        let mut activity = session.receive_active_changed().await;

        info!("Подписка на события logind установлена");

        loop {
            tokio::select! {
                Some(signal) = sleep_signals.next() => {
                    match signal.args() {
                        Ok(args) => {
                            if !self.send(Self::sleep_event(args.start)).await {
                                break;
                            }
                        }
                        Err(e) => warn!("Не удалось разобрать PrepareForSleep: {}", e),
                    }
                }
                Some(change) = activity.next() => {
                    match change.get().await {
                        Ok(active) => {
                            if !self.send(Self::activity_event(active)).await {
                                break;
                            }
                        }
                        Err(e) => warn!("Не удалось прочитать Session.Active: {}", e),
                    }
                }
                else => break,
            }
        }

        info!("Мониторинг сессии завершён");
        Ok(())
    }
}

/// В режиме сухого запуска сессия всегда активна
pub struct DrySessionMonitor;

#[async_trait]
impl SessionMonitorTrait for DrySessionMonitor {
    async fn run(self: Box<Self>) -> Result<()> {
        info!("[DRY RUN] Мониторинг сессии эмулируется: сессия всегда активна");
        std::future::pending::<()>().await;
        Ok(())
    }
}
