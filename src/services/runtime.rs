//! Последовательный исполнитель SwitchEngine.
//!
//! Все входные события движка проходят через одну ограниченную очередь
//! и применяются в порядке поступления.

use crate::config::CapabilityConfig;
use crate::error::Result;
use crate::events::{ChangeSource, ForegroundApp, SessionEvent};
use crate::fkey_error;
use crate::mode::{Behavior, Mode, SwitchMethod};
use crate::services::capability::CapabilityProbe;
use crate::services::switch_engine::{EngineState, SwitchEngine};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

const QUEUE_CAPACITY: usize = 64;

/// Входные события движка
#[derive(Debug)]
pub enum EngineInput {
    Foreground(ForegroundApp),
    Session(SessionEvent),
    /// Результат фоновой проверки доступа к клавиатуре
    Capability(bool),
    ToggleRequested,
    Command(EngineCommand),
}

/// Команды пользователя с ответом
#[derive(Debug)]
pub enum EngineCommand {
    SetRule {
        application_id: String,
        bundle_location: PathBuf,
        behavior: Behavior,
        source: ChangeSource,
        reply: oneshot::Sender<Result<()>>,
    },
    SetSwitchMethod {
        method: SwitchMethod,
        reply: oneshot::Sender<Result<()>>,
    },
    SetEnabled {
        enabled: bool,
        reply: oneshot::Sender<Result<()>>,
    },
    SetDefaultMode {
        mode: Mode,
        reply: oneshot::Sender<Result<()>>,
    },
    Snapshot {
        reply: oneshot::Sender<EngineState>,
    },
    Shutdown {
        reply: oneshot::Sender<Result<()>>,
    },
}

/// Клонируемый доступ к движку из других задач
#[derive(Clone)]
pub struct EngineHandle {
    sender: mpsc::Sender<EngineInput>,
}

impl EngineHandle {
    pub fn sender(&self) -> mpsc::Sender<EngineInput> {
        self.sender.clone()
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> EngineCommand) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(EngineInput::Command(make(reply)))
            .await
            .map_err(|_| fkey_error!(channel, "движок остановлен"))?;
        response
            .await
            .map_err(|_| fkey_error!(channel, "движок не ответил"))
    }

    pub async fn set_rule(
        &self,
        application_id: impl Into<String>,
        bundle_location: impl Into<PathBuf>,
        behavior: Behavior,
        source: ChangeSource,
    ) -> Result<()> {
        let application_id = application_id.into();
        let bundle_location = bundle_location.into();
        self.request(|reply| EngineCommand::SetRule {
            application_id,
            bundle_location,
            behavior,
            source,
            reply,
        })
        .await?
    }

    pub async fn set_switch_method(&self, method: SwitchMethod) -> Result<()> {
        self.request(|reply| EngineCommand::SetSwitchMethod { method, reply }).await?
    }

    pub async fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.request(|reply| EngineCommand::SetEnabled { enabled, reply }).await?
    }

    pub async fn set_default_mode(&self, mode: Mode) -> Result<()> {
        self.request(|reply| EngineCommand::SetDefaultMode { mode, reply }).await?
    }

    pub async fn snapshot(&self) -> Result<EngineState> {
        self.request(|reply| EngineCommand::Snapshot { reply }).await
    }

    /// Переключить признак включения (SIGUSR1)
    pub async fn toggle_enabled(&self) -> Result<()> {
        let enabled = self.snapshot().await?.enabled;
        self.set_enabled(!enabled).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.request(|reply| EngineCommand::Shutdown { reply }).await?
    }
}

/// Приёмная сторона очереди движка
pub struct EngineInbox {
    receiver: mpsc::Receiver<EngineInput>,
    // слабая ссылка не держит очередь открытой после ухода всех отправителей
    feedback: mpsc::WeakSender<EngineInput>,
}

/// Создать очередь заранее: источникам событий нужен отправитель до создания движка
pub fn engine_channel() -> (EngineHandle, EngineInbox) {
    let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
    let feedback = sender.downgrade();
    (EngineHandle { sender }, EngineInbox { receiver, feedback })
}

pub struct EngineRuntime {
    engine: SwitchEngine,
    receiver: mpsc::Receiver<EngineInput>,
    feedback: mpsc::WeakSender<EngineInput>,
    probe: Arc<dyn CapabilityProbe>,
    capability: CapabilityConfig,
    next_poll: Instant,
    probing: bool,
}

impl EngineRuntime {
    pub fn new(
        engine: SwitchEngine,
        inbox: EngineInbox,
        probe: Arc<dyn CapabilityProbe>,
        capability: CapabilityConfig,
    ) -> Self {
        Self {
            engine,
            receiver: inbox.receiver,
            feedback: inbox.feedback,
            probe,
            capability,
            next_poll: Instant::now(),
            probing: false,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        info!("EngineRuntime запущен");
        self.engine.start();
        self.start_probe();

        loop {
            // опрос доступа только пока сессия активна и предыдущая проверка завершена
            let polling = self.engine.state().session_active && !self.probing;

            tokio::select! {
                input = self.receiver.recv() => match input {
                    Some(input) => {
                        if self.dispatch(input) {
                            break;
                        }
                    }
                    None => {
                        info!("Все отправители закрыты, завершаем движок");
                        if let Err(e) = self.engine.shutdown() {
                            warn!("Ошибка при завершении движка: {}", e);
                        }
                        break;
                    }
                },
                _ = sleep_until(self.next_poll), if polling => self.start_probe(),
            }
        }

        info!("EngineRuntime остановлен");
        Ok(())
    }

    /// Проверка открывает устройства в /dev/input, поэтому идёт в блокирующем пуле,
    /// а результат возвращается в очередь как `EngineInput::Capability`
    fn start_probe(&mut self) {
        self.probing = true;
        let probe = self.probe.clone();
        let feedback = self.feedback.clone();
        tokio::task::spawn_blocking(move || {
            let granted = probe.probe();
            if let Some(sender) = feedback.upgrade() {
                let _ = sender.blocking_send(EngineInput::Capability(granted));
            }
        });
    }

    fn finish_probe(&mut self, granted: bool) {
        self.probing = false;
        self.engine.handle_capability(granted);
        self.next_poll = Instant::now() + self.capability.poll_interval(granted);
    }

    /// Применить событие; `true` означает завершение
    fn dispatch(&mut self, input: EngineInput) -> bool {
        match input {
            EngineInput::Foreground(app) => log_failure("смена окна", self.engine.handle_foreground_changed(app)),
            EngineInput::Session(event) => {
                let resumed = event == SessionEvent::Active && !self.engine.state().session_active;
                log_failure("событие сессии", self.engine.handle_session(event));
                if resumed {
                    self.next_poll = Instant::now();
                }
            }
            EngineInput::Capability(granted) => self.finish_probe(granted),
            EngineInput::ToggleRequested => log_failure("жест", self.engine.handle_toggle_requested()),
            EngineInput::Command(command) => return self.execute(command),
        }
        false
    }

    fn execute(&mut self, command: EngineCommand) -> bool {
        debug!("Команда: {:?}", command);
        match command {
            EngineCommand::SetRule {
                application_id,
                bundle_location,
                behavior,
                source,
                reply,
            } => {
                let result = self.engine.set_rule(&application_id, &bundle_location, behavior, source);
                let _ = reply.send(result);
            }
            EngineCommand::SetSwitchMethod { method, reply } => {
                let _ = reply.send(self.engine.set_switch_method(method));
            }
            EngineCommand::SetEnabled { enabled, reply } => {
                let _ = reply.send(self.engine.set_enabled(enabled));
            }
            EngineCommand::SetDefaultMode { mode, reply } => {
                let _ = reply.send(self.engine.set_default_mode(mode));
            }
            EngineCommand::Snapshot { reply } => {
                let _ = reply.send(self.engine.snapshot());
            }
            EngineCommand::Shutdown { reply } => {
                let _ = reply.send(self.engine.shutdown());
                return true;
            }
        }
        false
    }
}

// сбой устройства уже опубликован движком как DeviceFailure и записан StatusReporter
fn log_failure(context: &str, result: Result<()>) {
    match result {
        Ok(()) => {}
        Err(e) if e.as_device_error().is_some() => debug!("Сбой устройства при обработке ({}): {}", context, e),
        Err(e) => warn!("Ошибка при обработке ({}): {}", context, e),
    }
}
