use crate::debug_if_enabled;
use crate::events::{KeyCode, RawKeyEvent};
use crate::services::keyboard_listener::ModifierState;
use std::time::{Duration, Instant};

pub const DEFAULT_MAX_GESTURE_DELAY_MS: u64 = 280;

/// Распознанный жест
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    ToggleRequested,
}

/// Состояние ожидания отпускания триггера.
///
/// Инвариант: `pending_press` задан только пока `awaiting_release == true`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GestureState {
    pub pending_press: Option<Instant>,
    pub awaiting_release: bool,
}

impl GestureState {
    fn arm(&mut self, at: Instant) {
        self.pending_press = Some(at);
        self.awaiting_release = true;
    }

    fn reset(&mut self) {
        self.pending_press = None;
        self.awaiting_release = false;
    }
}

/// Классификатор быстрого нажатия триггерной клавиши.
///
/// Жест: триггер нажат без других модификаторов и отпущен не позже `max_delay`,
/// без каких-либо других переходов клавиш между нажатием и отпусканием.
pub struct GestureDetector {
    trigger: KeyCode,
    max_delay: Duration,
    modifiers: ModifierState,
    state: GestureState,
}

impl GestureDetector {
    pub fn new(trigger: KeyCode, max_delay: Duration) -> Self {
        Self {
            trigger,
            max_delay,
            modifiers: ModifierState::new(),
            state: GestureState::default(),
        }
    }

    pub fn trigger(&self) -> KeyCode {
        self.trigger
    }

    #[cfg(test)]
    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn handle(&mut self, event: &RawKeyEvent) -> Option<Gesture> {
        if event.key_code == self.trigger {
            self.modifiers.update_key(event.key_code, event.is_key_down);
            return self.handle_trigger(event);
        }

        let is_modifier = self.modifiers.update_key(event.key_code, event.is_key_down);
        // Любой другой модификатор или нажатие обычной клавиши дисквалифицирует жест
        if self.state.awaiting_release && (is_modifier || event.is_key_down) {
            debug_if_enabled!("Жест прерван клавишей {}", event.key_code);
            self.state.reset();
        }
        None
    }

    fn handle_trigger(&mut self, event: &RawKeyEvent) -> Option<Gesture> {
        if event.is_key_down {
            if self.modifiers.any_held_except(self.trigger) {
                debug_if_enabled!("Триггер нажат вместе с модификаторами: {}", self.modifiers);
                self.state.reset();
            } else {
                self.state.arm(event.timestamp);
            }
            return None;
        }

        let pending = self.state.pending_press.filter(|_| self.state.awaiting_release);
        self.state.reset();

        let pressed_at = pending?;
        let delta = event.timestamp.saturating_duration_since(pressed_at);
        if delta <= self.max_delay {
            debug_if_enabled!("Жест распознан: {}мс", delta.as_millis());
            Some(Gesture::ToggleRequested)
        } else {
            debug_if_enabled!(
                "Триггер удерживался слишком долго: {}мс > {}мс",
                delta.as_millis(),
                self.max_delay.as_millis()
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FN: KeyCode = KeyCode(464);
    const LEFT_CTRL: KeyCode = KeyCode(29);
    const KEY_A: KeyCode = KeyCode(30);

    fn detector() -> GestureDetector {
        GestureDetector::new(FN, Duration::from_millis(DEFAULT_MAX_GESTURE_DELAY_MS))
    }

    fn tap(detector: &mut GestureDetector, start: Instant, hold: Duration) -> Option<Gesture> {
        assert!(detector.handle(&RawKeyEvent::down(FN, start)).is_none());
        detector.handle(&RawKeyEvent::up(FN, start + hold))
    }

    #[test]
    fn test_quick_tap_emits_toggle() {
        let mut detector = detector();
        let start = Instant::now();
        let threshold = Duration::from_millis(DEFAULT_MAX_GESTURE_DELAY_MS);

        assert_eq!(
            tap(&mut detector, start, threshold - Duration::from_millis(1)),
            Some(Gesture::ToggleRequested)
        );
        assert_eq!(detector.state(), GestureState::default());
    }

    #[test]
    fn test_slow_release_is_ignored() {
        let mut detector = detector();
        let start = Instant::now();
        let threshold = Duration::from_millis(DEFAULT_MAX_GESTURE_DELAY_MS);

        assert_eq!(tap(&mut detector, start, threshold + Duration::from_millis(1)), None);
        assert!(!detector.state().awaiting_release);
    }

    #[test]
    fn test_interleaved_modifier_suppresses_gesture() {
        let mut detector = detector();
        let start = Instant::now();

        detector.handle(&RawKeyEvent::down(FN, start));
        assert!(detector.state().awaiting_release);

        detector.handle(&RawKeyEvent::down(LEFT_CTRL, start + Duration::from_millis(10)));
        assert_eq!(detector.state(), GestureState::default());
        detector.handle(&RawKeyEvent::up(LEFT_CTRL, start + Duration::from_millis(20)));

        let result = detector.handle(&RawKeyEvent::up(FN, start + Duration::from_millis(30)));
        assert_eq!(result, None);
    }

    #[test]
    fn test_regular_key_press_suppresses_gesture() {
        let mut detector = detector();
        let start = Instant::now();

        detector.handle(&RawKeyEvent::down(FN, start));
        detector.handle(&RawKeyEvent::down(KEY_A, start + Duration::from_millis(5)));
        let result = detector.handle(&RawKeyEvent::up(FN, start + Duration::from_millis(10)));
        assert_eq!(result, None);
    }

    #[test]
    fn test_trigger_with_held_modifier_is_not_armed() {
        let mut detector = detector();
        let start = Instant::now();

        detector.handle(&RawKeyEvent::down(LEFT_CTRL, start));
        detector.handle(&RawKeyEvent::down(FN, start + Duration::from_millis(5)));
        assert!(!detector.state().awaiting_release);
        assert!(detector.state().pending_press.is_none());

        let result = detector.handle(&RawKeyEvent::up(FN, start + Duration::from_millis(10)));
        assert_eq!(result, None);
    }

    #[test]
    fn test_release_without_press_is_ignored() {
        let mut detector = detector();
        assert_eq!(detector.handle(&RawKeyEvent::up(FN, Instant::now())), None);
    }

    #[test]
    fn test_consecutive_taps() {
        let mut detector = detector();
        let start = Instant::now();
        let hold = Duration::from_millis(50);

        assert_eq!(tap(&mut detector, start, hold), Some(Gesture::ToggleRequested));
        let second = start + Duration::from_millis(500);
        assert_eq!(tap(&mut detector, second, hold), Some(Gesture::ToggleRequested));
    }

    #[test]
    fn test_custom_threshold() {
        let mut detector = GestureDetector::new(FN, Duration::from_millis(100));
        let start = Instant::now();
        assert_eq!(tap(&mut detector, start, Duration::from_millis(150)), None);
        let later = start + Duration::from_millis(500);
        assert_eq!(tap(&mut detector, later, Duration::from_millis(100)), Some(Gesture::ToggleRequested));
    }
}
