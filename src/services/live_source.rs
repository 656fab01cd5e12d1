use tokio::task::JoinHandle;
use tracing::info;

/// Источник событий, на который движок подписывается и от которого отписывается.
///
/// Неактивный источник ничего не наблюдает: ни задачи, ни открытого устройства.
pub trait LiveSource: Send {
    fn name(&self) -> &str;
    fn activate(&mut self);
    fn deactivate(&mut self);
    fn is_active(&self) -> bool;
}

type Spawner = Box<dyn FnMut() -> JoinHandle<()> + Send>;

/// Источник, который на время подписки запускает задачу tokio и прерывает её при отписке
pub struct TaskSource {
    name: String,
    spawner: Spawner,
    handle: Option<JoinHandle<()>>,
}

impl TaskSource {
    pub fn new(name: impl Into<String>, spawner: impl FnMut() -> JoinHandle<()> + Send + 'static) -> Self {
        Self {
            name: name.into(),
            spawner: Box::new(spawner),
            handle: None,
        }
    }
}

impl LiveSource for TaskSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn activate(&mut self) {
        if self.is_active() {
            return;
        }
        info!("Подписка на источник '{}'", self.name);
        self.handle = Some((self.spawner)());
    }

    fn deactivate(&mut self) {
        if let Some(handle) = self.handle.take() {
            info!("Отписка от источника '{}'", self.name);
            handle.abort();
        }
    }

    fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for TaskSource {
    fn drop(&mut self) {
        self.deactivate();
    }
}
