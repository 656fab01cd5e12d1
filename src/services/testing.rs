//! Тестовые двойники для зависимостей движка.

use crate::error::DeviceError;
use crate::events::EngineEvent;
use crate::mode::Mode;
use crate::services::device_gateway::DeviceGateway;
use crate::services::event_bus::EventObserver;
use crate::services::live_source::LiveSource;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct GatewayInner {
    mode: Option<Mode>,
    writes: Vec<Mode>,
    fail_writes: bool,
    fail_reads: bool,
}

/// Устройство-двойник: запоминает все записи, умеет отказывать
#[derive(Clone, Default)]
pub struct FakeGateway {
    inner: Arc<Mutex<GatewayInner>>,
}

impl FakeGateway {
    pub fn new(initial: Mode) -> Self {
        let gateway = Self::default();
        gateway.inner.lock().mode = Some(initial);
        gateway
    }

    pub fn writes(&self) -> Vec<Mode> {
        self.inner.lock().writes.clone()
    }

    pub fn write_count(&self) -> usize {
        self.inner.lock().writes.len()
    }

    pub fn clear_writes(&self) {
        self.inner.lock().writes.clear();
    }

    pub fn fail_writes(&self, fail: bool) {
        self.inner.lock().fail_writes = fail;
    }

    pub fn fail_reads(&self, fail: bool) {
        self.inner.lock().fail_reads = fail;
    }

    /// Изменить режим "извне", как это сделал бы другой экземпляр
    pub fn set_external(&self, mode: Mode) {
        self.inner.lock().mode = Some(mode);
    }
}

impl DeviceGateway for FakeGateway {
    fn read(&self) -> Result<Mode, DeviceError> {
        let inner = self.inner.lock();
        if inner.fail_reads {
            return Err(DeviceError::ReadFailure("fake read failure".into()));
        }
        inner.mode.ok_or_else(|| DeviceError::PortUnavailable("fake port".into()))
    }

    fn write(&self, mode: Mode) -> Result<Mode, DeviceError> {
        let mut inner = self.inner.lock();
        inner.writes.push(mode);
        if inner.fail_writes {
            return Err(DeviceError::WriteFailure("fake write failure".into()));
        }
        inner.mode = Some(mode);
        Ok(mode)
    }
}

/// Источник-двойник со счётчиками подписок
#[derive(Clone, Default)]
pub struct FakeSource {
    active: Arc<AtomicBool>,
    activations: Arc<AtomicUsize>,
    deactivations: Arc<AtomicUsize>,
}

impl FakeSource {
    pub fn active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn activations(&self) -> usize {
        self.activations.load(Ordering::SeqCst)
    }

    pub fn deactivations(&self) -> usize {
        self.deactivations.load(Ordering::SeqCst)
    }
}

impl LiveSource for FakeSource {
    fn name(&self) -> &str {
        "fake"
    }

    fn activate(&mut self) {
        if !self.active.swap(true, Ordering::SeqCst) {
            self.activations.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn deactivate(&mut self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.deactivations.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_active(&self) -> bool {
        self.active()
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, predicate: impl Fn(&EngineEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventObserver for RecordingObserver {
    fn name(&self) -> &str {
        "recorder"
    }

    fn on_event(&self, event: &EngineEvent) -> anyhow::Result<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}
