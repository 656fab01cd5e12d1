//! SwitchEngine: единственный владелец режима функциональных клавиш.
//!
//! Переходы выполняются последовательно (см. `runtime`), блокировки `EngineState` не нужны.
//! `current_mode` всегда равен последнему успешно записанному режиму, а запись
//! выполняется только если цель от него отличается. Исключение: запись после
//! пробуждения, она исправляет внешние изменения.

use crate::debug_if_enabled;
use crate::error::{DeviceError, FkeyError, Result};
use crate::events::{ChangeSource, DeviceOperation, EngineEvent, ForegroundApp, SessionEvent};
use crate::mode::{resolve, Behavior, Mode, SwitchMethod};
use crate::services::device_gateway::DeviceGateway;
use crate::services::event_bus::EventBus;
use crate::services::live_source::LiveSource;
use crate::store::{Preferences, RuleStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Снимок состояния движка
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineState {
    pub current_mode: Mode,
    /// Режим устройства при запуске; не меняется
    pub on_launch_mode: Mode,
    pub current_app_id: String,
    pub current_app_location: Option<PathBuf>,
    pub switch_method: SwitchMethod,
    pub is_device_capable: bool,
    pub enabled: bool,
    pub session_active: bool,
    pub default_mode: Mode,
}

/// Зависимости движка
pub struct EngineParts {
    pub gateway: Box<dyn DeviceGateway>,
    pub rules: Arc<RuleStore>,
    pub preferences: Preferences,
    pub bus: Arc<EventBus>,
    pub foreground: Box<dyn LiveSource>,
    pub gesture: Box<dyn LiveSource>,
}

pub struct SwitchEngine {
    state: EngineState,
    gateway: Box<dyn DeviceGateway>,
    rules: Arc<RuleStore>,
    preferences: Preferences,
    bus: Arc<EventBus>,
    foreground: Box<dyn LiveSource>,
    gesture: Box<dyn LiveSource>,
}

impl SwitchEngine {
    /// Создать движок; режим устройства читается один раз и запоминается как `on_launch_mode`
    pub fn new(parts: EngineParts) -> Result<Self> {
        let on_launch_mode = parts.gateway.read()?;
        let preferences = parts.preferences;

        let state = EngineState {
            current_mode: on_launch_mode,
            on_launch_mode,
            current_app_id: String::new(),
            current_app_location: None,
            switch_method: preferences.switch_method(),
            is_device_capable: false,
            enabled: !preferences.is_disabled(),
            session_active: true,
            default_mode: preferences.default_mode(),
        };

        info!(
            "SwitchEngine: режим при запуске {}, способ {}, включён: {}",
            state.on_launch_mode, state.switch_method, state.enabled
        );

        Ok(Self {
            state,
            gateway: parts.gateway,
            rules: parts.rules,
            preferences,
            bus: parts.bus,
            foreground: parts.foreground,
            gesture: parts.gesture,
        })
    }

    /// Подписаться на источники событий
    pub fn start(&mut self) {
        self.foreground.activate();
        self.update_gesture_subscription();
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn snapshot(&self) -> EngineState {
        let mut snapshot = self.state.clone();
        snapshot.default_mode = self.preferences.default_mode();
        snapshot
    }

    pub fn handle_foreground_changed(&mut self, app: ForegroundApp) -> Result<()> {
        debug_if_enabled!("Приложение на переднем плане: {}", app);
        self.state.current_app_id = app.application_id;
        self.state.current_app_location = app.bundle_location;

        self.adapt_mode_for_current_app(DeviceOperation::Resolve).map(|_| ())
    }

    pub fn set_rule(
        &mut self,
        application_id: &str,
        bundle_location: &Path,
        behavior: Behavior,
        source: ChangeSource,
    ) -> Result<()> {
        self.rules.set(application_id, behavior, bundle_location)?;
        self.bus.publish(&EngineEvent::RuleChanged {
            application_id: application_id.to_string(),
            behavior,
            source,
        });

        if application_id == self.state.current_app_id {
            self.adapt_mode_for_current_app(DeviceOperation::Command)?;
        }
        Ok(())
    }

    pub fn set_switch_method(&mut self, method: SwitchMethod) -> Result<()> {
        if method == self.state.switch_method {
            return Ok(());
        }

        self.preferences.set_switch_method(method)?;
        self.state.switch_method = method;
        info!("Способ переключения: {}", method);
        self.bus.publish(&EngineEvent::SwitchMethodChanged(method));

        let result = match method {
            SwitchMethod::WindowFollow => self.adapt_mode_for_current_app(DeviceOperation::Command),
            SwitchMethod::GlobalGesture => self.apply_default_mode(DeviceOperation::Command),
        };
        self.update_gesture_subscription();
        result.map(|_| ())
    }

    pub fn set_default_mode(&mut self, mode: Mode) -> Result<()> {
        if self.preferences.set_default_mode(mode)? {
            self.state.default_mode = mode;
            self.bus.publish(&EngineEvent::DefaultModeChanged(mode));
        }

        match self.state.switch_method {
            SwitchMethod::WindowFollow => self.adapt_mode_for_current_app(DeviceOperation::Command),
            SwitchMethod::GlobalGesture => self.apply_default_mode(DeviceOperation::Command),
        }
        .map(|_| ())
    }

    pub fn set_enabled(&mut self, enabled: bool) -> Result<()> {
        if enabled == self.state.enabled {
            return Ok(());
        }

        self.state.enabled = enabled;
        if let Err(e) = self.preferences.set_disabled(!enabled) {
            warn!("Не удалось сохранить признак включения: {}", e);
        }
        info!("Переключение режимов {}", if enabled { "включено" } else { "выключено" });
        self.bus.publish(&EngineEvent::EnabledChanged(enabled));

        let result = if enabled {
            match self.state.switch_method {
                SwitchMethod::WindowFollow => self.adapt_mode_for_current_app(DeviceOperation::Command),
                SwitchMethod::GlobalGesture => self.apply_default_mode(DeviceOperation::Command),
            }
        } else if self.state.session_active {
            self.apply_mode(self.state.on_launch_mode, DeviceOperation::Command)
        } else {
            Ok(false)
        };
        self.update_gesture_subscription();
        result.map(|_| ())
    }

    pub fn handle_toggle_requested(&mut self) -> Result<()> {
        if self.state.switch_method != SwitchMethod::GlobalGesture || !self.is_live() {
            debug_if_enabled!("Жест проигнорирован: способ {}, включён {}", self.state.switch_method, self.is_live());
            return Ok(());
        }

        let target = self.state.current_mode.counterpart();
        self.write_mode(target, DeviceOperation::Toggle)?;

        if self.preferences.set_default_mode(target)? {
            self.state.default_mode = target;
            self.bus.publish(&EngineEvent::DefaultModeChanged(target));
        }
        Ok(())
    }

    pub fn handle_session(&mut self, event: SessionEvent) -> Result<()> {
        match event {
            SessionEvent::Inactive => {
                if !self.state.session_active {
                    return Ok(());
                }
                info!("Сессия неактивна: возвращаем режим {} и отписываемся", self.state.on_launch_mode);
                self.state.session_active = false;
                self.foreground.deactivate();
                self.gesture.deactivate();
                self.apply_mode(self.state.on_launch_mode, DeviceOperation::Suspend).map(|_| ())
            }
            SessionEvent::Active => {
                if self.state.session_active {
                    return Ok(());
                }
                self.state.session_active = true;
                let target = self.resume_target();
                info!("Сессия снова активна: восстанавливаем режим {}", target);
                let result = self.write_mode(target, DeviceOperation::Resume);
                self.foreground.activate();
                self.update_gesture_subscription();
                result
            }
        }
    }

    pub fn handle_capability(&mut self, granted: bool) {
        if granted != self.state.is_device_capable {
            info!("Доступ к событиям клавиатуры: {}", if granted { "есть" } else { "нет" });
            self.state.is_device_capable = granted;
            self.bus.publish(&EngineEvent::CapabilityChanged(granted));
        }
        // заодно перезапускает упавший слушатель клавиатуры
        self.update_gesture_subscription();
    }

    /// Отписаться от источников и применить политику восстановления при выходе
    pub fn shutdown(&mut self) -> Result<()> {
        self.foreground.deactivate();
        self.gesture.deactivate();

        match self.preferences.exit_target(self.state.on_launch_mode) {
            Some(mode) => {
                info!("Восстановление режима при выходе: {}", mode);
                self.apply_mode(mode, DeviceOperation::Exit).map(|_| ())
            }
            None => Ok(()),
        }
    }

    /// Режим после пробуждения с учётом изменений, сделанных во время сна
    fn resume_target(&self) -> Mode {
        if !self.state.enabled {
            return self.state.on_launch_mode;
        }
        match self.state.switch_method {
            SwitchMethod::WindowFollow => resolve(
                self.rules.get(&self.state.current_app_id),
                self.preferences.default_mode(),
            ),
            SwitchMethod::GlobalGesture => self.preferences.default_mode(),
        }
    }

    fn is_live(&self) -> bool {
        self.state.enabled && self.state.session_active
    }

    fn adapt_mode_for_current_app(&mut self, operation: DeviceOperation) -> Result<bool> {
        if self.state.switch_method != SwitchMethod::WindowFollow || !self.is_live() {
            return Ok(false);
        }

        let behavior = self.rules.get(&self.state.current_app_id);
        let target = resolve(behavior, self.preferences.default_mode());
        debug_if_enabled!(
            "{}: поведение {}, целевой режим {}",
            self.state.current_app_id,
            behavior,
            target
        );
        self.apply_mode(target, operation)
    }

    fn apply_default_mode(&mut self, operation: DeviceOperation) -> Result<bool> {
        if !self.is_live() {
            return Ok(false);
        }
        self.apply_mode(self.preferences.default_mode(), operation)
    }

    /// Записать режим, только если он отличается от текущего
    fn apply_mode(&mut self, target: Mode, operation: DeviceOperation) -> Result<bool> {
        if target == self.state.current_mode {
            return Ok(false);
        }
        self.write_mode(target, operation)?;
        Ok(true)
    }

    fn write_mode(&mut self, target: Mode, operation: DeviceOperation) -> Result<()> {
        let applied = self
            .gateway
            .write(target)
            .map_err(|e| self.device_failure(operation, e))?;

        if applied != target {
            let mismatch = DeviceError::WriteFailure(format!(
                "устройство сообщило {} вместо {}",
                applied, target
            ));
            return Err(self.device_failure(operation, mismatch));
        }

        let changed = applied != self.state.current_mode;
        self.state.current_mode = applied;
        if changed {
            info!("Режим {} для {}", applied, self.state.current_app_id);
            self.bus.publish(&EngineEvent::ModeChanged(applied));
        }
        Ok(())
    }

    fn device_failure(&self, operation: DeviceOperation, e: DeviceError) -> FkeyError {
        error!("Сбой устройства ({:?}): {}", operation, e);
        self.bus.publish(&EngineEvent::DeviceFailure {
            operation,
            message: e.to_string(),
            user_visible: operation.is_user_visible(),
        });
        FkeyError::Device(e)
    }

    fn update_gesture_subscription(&mut self) {
        let wanted = self.state.switch_method == SwitchMethod::GlobalGesture
            && self.state.is_device_capable
            && self.is_live();

        match (wanted, self.gesture.is_active()) {
            (true, false) => self.gesture.activate(),
            (false, true) => self.gesture.deactivate(),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::preferences::{KEY_DISABLED, KEY_EXIT_MODE, KEY_EXIT_POLICY, KEY_SWITCH_METHOD};
    use crate::store::{MemoryBackend, SettingsStore};
    use crate::services::testing::{FakeGateway, FakeSource, RecordingObserver};

    struct Harness {
        engine: SwitchEngine,
        gateway: FakeGateway,
        foreground: FakeSource,
        gesture: FakeSource,
        recorder: Arc<RecordingObserver>,
        preferences: Preferences,
        rules: Arc<RuleStore>,
    }

    fn harness(initial: Mode, document: toml::Table) -> Harness {
        let settings = Arc::new(SettingsStore::open(Box::new(MemoryBackend::with_document(document))));
        let preferences = Preferences::new(settings.clone());
        let rules = Arc::new(RuleStore::load(settings));
        let bus = Arc::new(EventBus::new());
        let recorder = Arc::new(RecordingObserver::default());
        bus.subscribe(recorder.clone());

        let gateway = FakeGateway::new(initial);
        let foreground = FakeSource::default();
        let gesture = FakeSource::default();

        let mut engine = SwitchEngine::new(EngineParts {
            gateway: Box::new(gateway.clone()),
            rules: rules.clone(),
            preferences: preferences.clone(),
            bus,
            foreground: Box::new(foreground.clone()),
            gesture: Box::new(gesture.clone()),
        })
        .unwrap();
        engine.start();

        Harness {
            engine,
            gateway,
            foreground,
            gesture,
            recorder,
            preferences,
            rules,
        }
    }

    fn document(entries: &[(&str, toml::Value)]) -> toml::Table {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn gesture_document() -> toml::Table {
        document(&[(KEY_SWITCH_METHOD, toml::Value::String("global_gesture".into()))])
    }

    fn app(id: &str) -> ForegroundApp {
        ForegroundApp::new(id).with_location(format!("/usr/bin/{}", id))
    }

    fn mode_changes(recorder: &RecordingObserver, mode: Mode) -> usize {
        recorder.count(|e| *e == EngineEvent::ModeChanged(mode))
    }

    #[test]
    fn test_follows_foreground_rules() {
        let mut h = harness(Mode::Primary, toml::Table::new());
        h.rules
            .set("b", Behavior::SecondaryForced, Path::new("/usr/bin/b"))
            .unwrap();

        h.engine.handle_foreground_changed(app("a")).unwrap();
        assert_eq!(h.gateway.write_count(), 0);
        assert_eq!(h.engine.state().current_mode, Mode::Primary);

        h.engine.handle_foreground_changed(app("b")).unwrap();
        assert_eq!(h.gateway.writes(), vec![Mode::Secondary]);
        assert_eq!(mode_changes(&h.recorder, Mode::Secondary), 1);
        assert_eq!(h.engine.state().current_app_id, "b");
    }

    #[test]
    fn test_same_target_never_writes() {
        let mut h = harness(Mode::Secondary, document(&[("default_mode", toml::Value::String("secondary".into()))]));

        for id in ["a", "b", "c", "a"] {
            h.engine.handle_foreground_changed(app(id)).unwrap();
        }
        assert_eq!(h.gateway.write_count(), 0);
        assert!(h.recorder.events().is_empty());
    }

    #[test]
    fn test_gesture_toggles_global_mode() {
        let mut h = harness(Mode::Primary, gesture_document());
        assert!(!h.gesture.active());

        h.engine.handle_capability(true);
        assert!(h.gesture.active());

        h.engine.handle_toggle_requested().unwrap();
        assert_eq!(h.gateway.writes(), vec![Mode::Secondary]);
        assert_eq!(h.preferences.default_mode(), Mode::Secondary);
        assert_eq!(mode_changes(&h.recorder, Mode::Secondary), 1);

        h.engine.handle_toggle_requested().unwrap();
        assert_eq!(h.gateway.writes(), vec![Mode::Secondary, Mode::Primary]);
        assert_eq!(h.preferences.default_mode(), Mode::Primary);
        assert_eq!(h.engine.state().current_mode, Mode::Primary);
    }

    #[test]
    fn test_toggle_ignored_in_window_follow() {
        let mut h = harness(Mode::Primary, toml::Table::new());
        h.engine.handle_capability(true);
        assert!(!h.gesture.active());

        h.engine.handle_toggle_requested().unwrap();
        assert_eq!(h.gateway.write_count(), 0);
    }

    #[test]
    fn test_session_suspend_and_resume() {
        let mut h = harness(Mode::Primary, toml::Table::new());
        h.rules
            .set("b", Behavior::SecondaryForced, Path::new("/usr/bin/b"))
            .unwrap();
        h.engine.handle_foreground_changed(app("b")).unwrap();
        assert_eq!(h.engine.state().current_mode, Mode::Secondary);
        h.gateway.clear_writes();

        h.engine.handle_session(SessionEvent::Inactive).unwrap();
        assert_eq!(h.gateway.writes(), vec![Mode::Primary]);
        assert!(!h.foreground.active());
        assert!(!h.gesture.active());

        // повторное событие ничего не пишет
        h.engine.handle_session(SessionEvent::Inactive).unwrap();
        assert_eq!(h.gateway.write_count(), 1);

        h.engine.handle_session(SessionEvent::Active).unwrap();
        assert_eq!(h.gateway.writes(), vec![Mode::Primary, Mode::Secondary]);
        assert!(h.foreground.active());
        assert_eq!(h.foreground.activations(), 2);
        assert_eq!(h.engine.state().current_mode, Mode::Secondary);
    }

    #[test]
    fn test_disabled_during_sleep_wakes_in_launch_mode() {
        let mut h = harness(Mode::Primary, toml::Table::new());
        h.rules
            .set("b", Behavior::SecondaryForced, Path::new("/usr/bin/b"))
            .unwrap();
        h.engine.handle_foreground_changed(app("b")).unwrap();

        h.engine.handle_session(SessionEvent::Inactive).unwrap();
        h.engine.set_enabled(false).unwrap();
        assert_eq!(h.gateway.writes(), vec![Mode::Secondary, Mode::Primary]);

        h.engine.handle_session(SessionEvent::Active).unwrap();
        assert_eq!(h.gateway.writes(), vec![Mode::Secondary, Mode::Primary, Mode::Primary]);
        assert_eq!(h.engine.state().current_mode, Mode::Primary);
        assert!(!h.engine.state().enabled);
    }

    #[test]
    fn test_enabled_during_sleep_wakes_in_gesture_default() {
        let mut h = harness(
            Mode::Primary,
            document(&[
                (KEY_SWITCH_METHOD, toml::Value::String("global_gesture".into())),
                (KEY_DISABLED, toml::Value::Boolean(true)),
                ("default_mode", toml::Value::String("secondary".into())),
            ]),
        );
        h.engine.handle_capability(true);
        assert!(!h.gesture.active());

        h.engine.handle_session(SessionEvent::Inactive).unwrap();
        h.engine.set_enabled(true).unwrap();
        assert_eq!(h.gateway.write_count(), 0);
        assert!(!h.gesture.active());

        h.engine.handle_session(SessionEvent::Active).unwrap();
        assert_eq!(h.gateway.writes(), vec![Mode::Secondary]);
        assert_eq!(h.engine.state().current_mode, Mode::Secondary);
        assert!(h.gesture.active());
    }

    #[test]
    fn test_method_change_during_sleep_applies_on_wake() {
        let mut h = harness(Mode::Primary, document(&[("default_mode", toml::Value::String("secondary".into()))]));
        h.rules
            .set("a", Behavior::PrimaryForced, Path::new("/usr/bin/a"))
            .unwrap();
        h.engine.handle_foreground_changed(app("a")).unwrap();
        assert_eq!(h.gateway.write_count(), 0);

        h.engine.handle_session(SessionEvent::Inactive).unwrap();
        h.engine.set_switch_method(SwitchMethod::GlobalGesture).unwrap();
        assert_eq!(h.gateway.write_count(), 0);

        h.engine.handle_session(SessionEvent::Active).unwrap();
        assert_eq!(h.gateway.writes(), vec![Mode::Secondary]);
    }

    #[test]
    fn test_resume_corrects_external_drift() {
        let mut h = harness(Mode::Primary, toml::Table::new());
        h.engine.handle_session(SessionEvent::Inactive).unwrap();
        assert_eq!(h.gateway.write_count(), 0);

        h.gateway.set_external(Mode::Secondary);
        h.engine.handle_session(SessionEvent::Active).unwrap();
        assert_eq!(h.gateway.writes(), vec![Mode::Primary]);
    }

    #[test]
    fn test_suspended_gesture_mode_resubscribes_on_wake() {
        let mut h = harness(Mode::Primary, gesture_document());
        h.engine.handle_capability(true);
        assert!(h.gesture.active());

        h.engine.handle_session(SessionEvent::Inactive).unwrap();
        assert!(!h.gesture.active());
        h.engine.handle_toggle_requested().unwrap();
        assert_eq!(h.gateway.write_count(), 0);

        h.engine.handle_session(SessionEvent::Active).unwrap();
        assert!(h.gesture.active());
    }

    #[test]
    fn test_rule_change_for_foreground_app() {
        let mut h = harness(Mode::Primary, toml::Table::new());
        h.engine.handle_foreground_changed(app("a")).unwrap();

        h.engine
            .set_rule("other", Path::new("/usr/bin/other"), Behavior::SecondaryForced, ChangeSource::RuleList)
            .unwrap();
        assert_eq!(h.gateway.write_count(), 0);
        assert_eq!(h.recorder.count(|e| matches!(e, EngineEvent::RuleChanged { .. })), 1);

        h.engine
            .set_rule("a", Path::new("/usr/bin/a"), Behavior::SecondaryForced, ChangeSource::RunningApps)
            .unwrap();
        assert_eq!(h.gateway.writes(), vec![Mode::Secondary]);

        h.engine
            .set_rule("a", Path::new("/usr/bin/a"), Behavior::Inferred, ChangeSource::Menu)
            .unwrap();
        assert_eq!(h.gateway.writes(), vec![Mode::Secondary, Mode::Primary]);
        assert_eq!(h.recorder.count(|e| matches!(e, EngineEvent::RuleChanged { .. })), 3);
    }

    #[test]
    fn test_switch_method_transitions() {
        let mut h = harness(Mode::Primary, document(&[("default_mode", toml::Value::String("secondary".into()))]));
        h.rules
            .set("a", Behavior::PrimaryForced, Path::new("/usr/bin/a"))
            .unwrap();
        h.engine.handle_foreground_changed(app("a")).unwrap();
        h.engine.handle_capability(true);
        assert_eq!(h.gateway.write_count(), 0);

        h.engine.set_switch_method(SwitchMethod::GlobalGesture).unwrap();
        assert_eq!(h.gateway.writes(), vec![Mode::Secondary]);
        assert!(h.gesture.active());
        assert_eq!(h.preferences.switch_method(), SwitchMethod::GlobalGesture);

        h.engine.set_switch_method(SwitchMethod::WindowFollow).unwrap();
        assert_eq!(h.gateway.writes(), vec![Mode::Secondary, Mode::Primary]);
        assert!(!h.gesture.active());
        assert_eq!(
            h.recorder.count(|e| matches!(e, EngineEvent::SwitchMethodChanged(_))),
            2
        );

        // тот же способ: ничего не происходит
        h.engine.set_switch_method(SwitchMethod::WindowFollow).unwrap();
        assert_eq!(h.gateway.write_count(), 2);
    }

    #[test]
    fn test_capability_only_gates_gesture() {
        let mut h = harness(Mode::Primary, gesture_document());

        h.engine.handle_capability(true);
        assert!(h.gesture.active());
        h.engine.handle_capability(false);
        assert!(!h.gesture.active());
        h.engine.handle_capability(false);

        assert_eq!(h.gesture.activations(), 1);
        assert_eq!(h.gesture.deactivations(), 1);
        assert_eq!(h.gateway.write_count(), 0);
        assert_eq!(h.recorder.count(|e| matches!(e, EngineEvent::CapabilityChanged(_))), 2);
    }

    #[test]
    fn test_disable_and_reenable() {
        let mut h = harness(Mode::Primary, toml::Table::new());
        h.rules
            .set("b", Behavior::SecondaryForced, Path::new("/usr/bin/b"))
            .unwrap();
        h.engine.handle_foreground_changed(app("b")).unwrap();

        h.engine.set_enabled(false).unwrap();
        assert_eq!(h.gateway.writes(), vec![Mode::Secondary, Mode::Primary]);
        assert!(h.preferences.is_disabled());

        // пока выключен, смена приложения только запоминается
        h.engine.handle_foreground_changed(app("a")).unwrap();
        h.engine.handle_foreground_changed(app("b")).unwrap();
        assert_eq!(h.gateway.write_count(), 2);
        assert_eq!(h.engine.state().current_app_id, "b");

        h.engine.set_enabled(true).unwrap();
        assert_eq!(h.gateway.writes(), vec![Mode::Secondary, Mode::Primary, Mode::Secondary]);
        assert!(!h.preferences.is_disabled());
    }

    #[test]
    fn test_disabled_at_launch() {
        let mut h = harness(Mode::Primary, document(&[(KEY_DISABLED, toml::Value::Boolean(true))]));
        h.rules
            .set("b", Behavior::SecondaryForced, Path::new("/usr/bin/b"))
            .unwrap();

        assert!(!h.engine.state().enabled);
        assert!(h.foreground.active());
        h.engine.handle_foreground_changed(app("b")).unwrap();
        assert_eq!(h.gateway.write_count(), 0);
    }

    #[test]
    fn test_default_mode_change_reresolves_inferred_app() {
        let mut h = harness(Mode::Primary, toml::Table::new());
        h.engine.handle_foreground_changed(app("a")).unwrap();

        h.engine.set_default_mode(Mode::Secondary).unwrap();
        assert_eq!(h.gateway.writes(), vec![Mode::Secondary]);
        assert_eq!(h.recorder.count(|e| *e == EngineEvent::DefaultModeChanged(Mode::Secondary)), 1);
        assert_eq!(h.engine.snapshot().default_mode, Mode::Secondary);
    }

    #[test]
    fn test_passive_write_failure_is_surfaced_and_recoverable() {
        let mut h = harness(Mode::Primary, toml::Table::new());
        h.rules
            .set("b", Behavior::SecondaryForced, Path::new("/usr/bin/b"))
            .unwrap();
        h.gateway.fail_writes(true);

        let err = h.engine.handle_foreground_changed(app("b")).unwrap_err();
        assert!(matches!(err.as_device_error(), Some(DeviceError::WriteFailure(_))));
        assert_eq!(h.engine.state().current_mode, Mode::Primary);
        assert_eq!(
            h.recorder.count(|e| matches!(e, EngineEvent::DeviceFailure { user_visible: false, .. })),
            1
        );

        h.gateway.fail_writes(false);
        h.engine.handle_foreground_changed(app("a")).unwrap();
        h.engine.handle_foreground_changed(app("b")).unwrap();
        assert_eq!(h.engine.state().current_mode, Mode::Secondary);
    }

    #[test]
    fn test_toggle_failure_is_user_visible() {
        let mut h = harness(Mode::Primary, gesture_document());
        h.engine.handle_capability(true);
        h.gateway.fail_writes(true);

        assert!(h.engine.handle_toggle_requested().is_err());
        assert_eq!(h.preferences.default_mode(), Mode::Primary);
        assert_eq!(h.engine.state().current_mode, Mode::Primary);
        assert_eq!(
            h.recorder.count(|e| matches!(e, EngineEvent::DeviceFailure { user_visible: true, .. })),
            1
        );
    }

    #[test]
    fn test_initial_read_failure() {
        let settings = Arc::new(SettingsStore::open(Box::new(MemoryBackend::new())));
        let gateway = FakeGateway::new(Mode::Primary);
        gateway.fail_reads(true);

        let result = SwitchEngine::new(EngineParts {
            gateway: Box::new(gateway),
            rules: Arc::new(RuleStore::load(settings.clone())),
            preferences: Preferences::new(settings),
            bus: Arc::new(EventBus::new()),
            foreground: Box::new(FakeSource::default()),
            gesture: Box::new(FakeSource::default()),
        });
        assert!(matches!(result, Err(FkeyError::Device(DeviceError::ReadFailure(_)))));
    }

    #[test]
    fn test_shutdown_restores_launch_mode() {
        let mut h = harness(
            Mode::Primary,
            document(&[(KEY_EXIT_POLICY, toml::Value::String("launch_mode".into()))]),
        );
        h.engine.set_default_mode(Mode::Secondary).unwrap();
        h.gateway.clear_writes();

        h.engine.shutdown().unwrap();
        assert_eq!(h.gateway.writes(), vec![Mode::Primary]);
        assert!(!h.foreground.active());
    }

    #[test]
    fn test_shutdown_fixed_and_keep_policies() {
        let mut fixed = harness(
            Mode::Primary,
            document(&[
                (KEY_EXIT_POLICY, toml::Value::String("fixed".into())),
                (KEY_EXIT_MODE, toml::Value::String("secondary".into())),
            ]),
        );
        fixed.engine.shutdown().unwrap();
        assert_eq!(fixed.gateway.writes(), vec![Mode::Secondary]);

        let mut keep = harness(Mode::Primary, toml::Table::new());
        keep.engine.set_default_mode(Mode::Secondary).unwrap();
        keep.gateway.clear_writes();
        keep.engine.shutdown().unwrap();
        assert_eq!(keep.gateway.write_count(), 0);
    }
}
