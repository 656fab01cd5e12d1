use crate::events::EngineEvent;
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Наблюдатель событий движка.
///
/// `handles` отфильтровывает ненужные события. Ошибка или паника в `on_event`
/// не мешает доставке остальным наблюдателям.
pub trait EventObserver: Send + Sync {
    fn name(&self) -> &str {
        "observer"
    }

    fn handles(&self, _event: &EngineEvent) -> bool {
        true
    }

    fn on_event(&self, event: &EngineEvent) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Рассылка событий движка подписчикам в порядке публикации
#[derive(Default)]
pub struct EventBus {
    observers: RwLock<Vec<(SubscriptionId, Arc<dyn EventObserver>)>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn EventObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        info!("Подписчик '{}' зарегистрирован ({:?})", observer.name(), id);
        self.observers.write().push((id, observer));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(sid, _)| *sid != id);
        before != observers.len()
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.observers.read().len()
    }

    /// Доставить событие всем подписчикам; возвращает число успешных доставок
    pub fn publish(&self, event: &EngineEvent) -> usize {
        // снимок, чтобы подписчик мог отписаться прямо из обработчика
        let observers: Vec<Arc<dyn EventObserver>> =
            self.observers.read().iter().map(|(_, o)| Arc::clone(o)).collect();

        let mut delivered = 0;
        for observer in observers.iter().filter(|o| o.handles(event)) {
            match catch_unwind(AssertUnwindSafe(|| observer.on_event(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => warn!("Подписчик '{}' вернул ошибку на {}: {}", observer.name(), event, e),
                Err(_) => error!("Подписчик '{}' аварийно завершился на {}", observer.name(), event),
            }
        }
        delivered
    }
}

/// Журналирует все события (замена индикатора состояния в системном трее)
pub struct StatusReporter;

impl EventObserver for StatusReporter {
    fn name(&self) -> &str {
        "status"
    }

    fn on_event(&self, event: &EngineEvent) -> anyhow::Result<()> {
        match event {
            EngineEvent::DeviceFailure { user_visible: true, .. } => error!("⚠️  {}", event),
            EngineEvent::DeviceFailure { .. } => warn!("{}", event),
            _ => info!("{}", event),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::Mode;
    use crate::services::testing::RecordingObserver;

    struct FailingObserver;

    impl EventObserver for FailingObserver {
        fn on_event(&self, _event: &EngineEvent) -> anyhow::Result<()> {
            anyhow::bail!("broken")
        }
    }

    struct PanickingObserver;

    impl EventObserver for PanickingObserver {
        fn on_event(&self, _event: &EngineEvent) -> anyhow::Result<()> {
            panic!("observer panic")
        }
    }

    struct ModeOnly(RecordingObserver);

    impl EventObserver for ModeOnly {
        fn handles(&self, event: &EngineEvent) -> bool {
            matches!(event, EngineEvent::ModeChanged(_))
        }

        fn on_event(&self, event: &EngineEvent) -> anyhow::Result<()> {
            self.0.on_event(event)
        }
    }

    #[test]
    fn test_delivery_in_publish_order() {
        let bus = EventBus::new();
        let recorder = Arc::new(RecordingObserver::default());
        bus.subscribe(recorder.clone());

        bus.publish(&EngineEvent::ModeChanged(Mode::Secondary));
        bus.publish(&EngineEvent::EnabledChanged(false));

        assert_eq!(
            recorder.events(),
            vec![EngineEvent::ModeChanged(Mode::Secondary), EngineEvent::EnabledChanged(false)]
        );
    }

    #[test]
    fn test_failing_observers_are_isolated() {
        let bus = EventBus::new();
        let recorder = Arc::new(RecordingObserver::default());
        bus.subscribe(Arc::new(FailingObserver));
        bus.subscribe(Arc::new(PanickingObserver));
        bus.subscribe(recorder.clone());

        let delivered = bus.publish(&EngineEvent::ModeChanged(Mode::Primary));
        assert_eq!(delivered, 1);
        assert_eq!(recorder.events().len(), 1);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let recorder = Arc::new(RecordingObserver::default());
        let id = bus.subscribe(recorder.clone());

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(&EngineEvent::ModeChanged(Mode::Primary));

        assert!(recorder.events().is_empty());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_handles_filters_events() {
        let bus = EventBus::new();
        let filtered = Arc::new(ModeOnly(RecordingObserver::default()));
        bus.subscribe(filtered.clone());

        bus.publish(&EngineEvent::EnabledChanged(true));
        bus.publish(&EngineEvent::ModeChanged(Mode::Secondary));

        assert_eq!(filtered.0.events(), vec![EngineEvent::ModeChanged(Mode::Secondary)]);
    }
}
