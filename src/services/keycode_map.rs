use std::collections::HashMap;
use once_cell::sync::Lazy;

/// Маппинг между именами клавиш и кодами evdev
pub struct KeycodeMap;

/// Класс клавиши-модификатора (левая и правая клавиши считаются одним модификатором)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierKind {
    Ctrl,
    Alt,
    Shift,
    Super,
    Fn,
    CapsLock,
}

pub const KEY_FN: u16 = 464;

// Статическая карта клавиш, которые могут служить триггером жеста или модификатором
static KEY_NAME_TO_CODE: Lazy<HashMap<&'static str, u16>> = Lazy::new(|| {
    let mut map = HashMap::new();

    // Модификаторы
    map.insert("fn", KEY_FN);        // KEY_FN
    map.insert("leftctrl", 29);      // KEY_LEFTCTRL
    map.insert("rightctrl", 97);     // KEY_RIGHTCTRL
    map.insert("leftalt", 56);       // KEY_LEFTALT
    map.insert("rightalt", 100);     // KEY_RIGHTALT
    map.insert("leftshift", 42);     // KEY_LEFTSHIFT
    map.insert("rightshift", 54);    // KEY_RIGHTSHIFT
    map.insert("leftmeta", 125);     // KEY_LEFTMETA
    map.insert("rightmeta", 126);    // KEY_RIGHTMETA
    map.insert("capslock", 58);      // KEY_CAPSLOCK

    // Функциональный ряд
    map.insert("f1", 59);
    map.insert("f2", 60);
    map.insert("f3", 61);
    map.insert("f4", 62);
    map.insert("f5", 63);
    map.insert("f6", 64);
    map.insert("f7", 65);
    map.insert("f8", 66);
    map.insert("f9", 67);
    map.insert("f10", 68);
    map.insert("f11", 87);
    map.insert("f12", 88);

    // Специальные клавиши
    map.insert("escape", 1);         // KEY_ESC
    map.insert("space", 57);         // KEY_SPACE
    map.insert("compose", 127);      // KEY_COMPOSE
    map.insert("scrolllock", 70);    // KEY_SCROLLLOCK
    map.insert("pause", 119);        // KEY_PAUSE

    map
});

static CODE_TO_KEY_NAME: Lazy<HashMap<u16, &'static str>> = Lazy::new(|| {
    KEY_NAME_TO_CODE.iter().map(|(&name, &code)| (code, name)).collect()
});

// Синонимы для конфигурации
static KEY_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut map = HashMap::new();
    map.insert("ctrl", "leftctrl");
    map.insert("alt", "leftalt");
    map.insert("shift", "leftshift");
    map.insert("super", "leftmeta");
    map.insert("meta", "leftmeta");
    map.insert("esc", "escape");
    map
});

impl KeycodeMap {
    /// Получить код клавиши по её имени
    pub fn get_keycode(key_name: &str) -> Result<u16, String> {
        let normalized = key_name.trim().to_lowercase();
        let canonical = KEY_ALIASES
            .get(normalized.as_str())
            .copied()
            .unwrap_or(normalized.as_str());

        KEY_NAME_TO_CODE.get(canonical)
            .copied()
            .ok_or_else(|| format!("Unknown key: {}", key_name))
    }

    /// Получить имя клавиши по её коду
    pub fn get_key_name(keycode: u16) -> Option<&'static str> {
        CODE_TO_KEY_NAME.get(&keycode).copied()
    }

    /// Класс модификатора для кода клавиши
    pub fn modifier_kind(keycode: u16) -> Option<ModifierKind> {
        match keycode {
            29 | 97 => Some(ModifierKind::Ctrl),
            56 | 100 => Some(ModifierKind::Alt),
            42 | 54 => Some(ModifierKind::Shift),
            125 | 126 => Some(ModifierKind::Super),
            KEY_FN => Some(ModifierKind::Fn),
            58 => Some(ModifierKind::CapsLock),
            _ => None,
        }
    }

    /// Проверить, является ли клавиша модификатором
    pub fn is_modifier(keycode: u16) -> bool {
        Self::modifier_kind(keycode).is_some()
    }
}
