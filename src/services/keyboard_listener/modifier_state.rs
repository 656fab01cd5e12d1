use crate::events::KeyCode;
use crate::services::keycode_map::KeycodeMap;
use std::collections::HashSet;
use std::fmt;

/// Зажатые в данный момент модификаторы (по кодам, левые и правые раздельно)
#[derive(Debug, Default)]
pub struct ModifierState {
    held: HashSet<u16>,
}

impl ModifierState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Обновить состояние; возвращает `true`, если клавиша является модификатором
    pub fn update_key(&mut self, key: KeyCode, pressed: bool) -> bool {
        if !KeycodeMap::is_modifier(key.value()) {
            return false;
        }
        if pressed {
            self.held.insert(key.value());
        } else {
            self.held.remove(&key.value());
        }
        true
    }

    /// Зажат ли какой-либо модификатор, кроме указанной клавиши
    pub fn any_held_except(&self, key: KeyCode) -> bool {
        self.held.iter().any(|&code| code != key.value())
    }
}

impl fmt::Display for ModifierState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.held.is_empty() {
            return write!(f, "none");
        }
        let mut names: Vec<String> = self.held.iter().map(|&c| KeyCode(c).to_string()).collect();
        names.sort();
        write!(f, "{}", names.join("+"))
    }
}
