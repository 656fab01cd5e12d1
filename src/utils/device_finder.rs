use crate::error::{FkeyError, Result};
use crate::fkey_error;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Поиск клавиатуры среди устройств /dev/input
pub struct DeviceFinder;

impl DeviceFinder {
    /// Найти клавиатуру, которую процесс может читать
    pub fn find_keyboard_device(device_path: &str) -> Result<PathBuf> {
        if device_path != "auto" {
            let path = PathBuf::from(device_path);
            if !path.exists() {
                return FkeyError::device_not_found(format!("Указанное устройство не найдено: {:?}", path));
            }
            if !Self::is_device_accessible(&path) {
                return Err(fkey_error!(permission, "Нет доступа на чтение {:?}", path));
            }
            return Ok(path);
        }

        Self::auto_find_keyboard(Path::new("/dev/input"))
    }

    /// Есть ли сейчас хотя бы одна доступная на чтение клавиатура
    pub fn has_accessible_keyboard(device_path: &str) -> bool {
        Self::find_keyboard_device(device_path).is_ok()
    }

    fn auto_find_keyboard(input_dir: &Path) -> Result<PathBuf> {
        if let Some(device) = Self::best_by_id(&input_dir.join("by-id")) {
            debug!("Клавиатура найдена по ID: {:?}", device);
            return Ok(device);
        }

        if let Some(device) = Self::first_event_device(input_dir)? {
            debug!("Клавиатура найдена среди event устройств: {:?}", device);
            return Ok(device);
        }

        FkeyError::device_not_found(
            "Нет доступной клавиатуры. Убедитесь, что пользователь добавлен в группу 'input'",
        )
    }

    /// Ссылки by-id с `kbd` в имени, лучшие первыми
    fn best_by_id(by_id_dir: &Path) -> Option<PathBuf> {
        let entries = fs::read_dir(by_id_dir).ok()?;

        let mut candidates: Vec<(PathBuf, u8)> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter_map(|path| {
                let name = path.file_name()?.to_str()?.to_string();
                Self::by_id_priority(&name).map(|priority| (path, priority))
            })
            .filter(|(path, _)| Self::is_device_accessible(path) && Self::is_keyboard_device(path))
            .collect();

        candidates.sort_by(|a, b| b.1.cmp(&a.1));
        candidates.into_iter().next().map(|(path, _)| path)
    }

    fn by_id_priority(name: &str) -> Option<u8> {
        let lower = name.to_lowercase();
        if !lower.contains("event") || lower.contains("mouse") {
            return None;
        }
        if lower.ends_with("event-kbd") {
            Some(100)
        } else if lower.contains("keyboard") {
            Some(50)
        } else if lower.contains("kbd") {
            Some(10)
        } else {
            None
        }
    }

    fn first_event_device(input_dir: &Path) -> Result<Option<PathBuf>> {
        let entries = fs::read_dir(input_dir)
            .map_err(|e| fkey_error!(permission, "Нет доступа к {:?}: {}", input_dir, e))?;

        let mut event_devices: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("event"))
            })
            .collect();
        event_devices.sort();

        Ok(event_devices
            .into_iter()
            .find(|path| Self::is_device_accessible(path) && Self::is_keyboard_device(path)))
    }

    fn is_keyboard_device(device_path: &Path) -> bool {
        let device = match evdev::Device::open(device_path) {
            Ok(device) => device,
            Err(e) => {
                debug!("Не удалось открыть устройство {:?}: {}", device_path, e);
                return false;
            }
        };

        let name = device.name().unwrap_or("Unknown").to_lowercase();
        if ["mouse", "touchpad", "trackpoint"].iter().any(|n| name.contains(n)) {
            return false;
        }

        let is_keyboard = device.supported_keys().is_some_and(|keys| {
            keys.contains(evdev::KeyCode::KEY_A)
                && keys.contains(evdev::KeyCode::KEY_SPACE)
                && keys.contains(evdev::KeyCode::KEY_ENTER)
        });

        if is_keyboard {
            info!("Устройство {:?} ({}) подходит как клавиатура", device_path, name);
        }
        is_keyboard
    }

    fn is_device_accessible(device_path: &Path) -> bool {
        match fs::File::open(device_path) {
            Ok(_) => true,
            Err(e) => {
                debug!("Устройство {:?} недоступно: {}", device_path, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specific_missing_path() {
        let result = DeviceFinder::find_keyboard_device("/non/existent/path");
        assert!(matches!(result, Err(FkeyError::DeviceNotFound(_))));
        assert!(!DeviceFinder::has_accessible_keyboard("/non/existent/path"));
    }

    #[test]
    fn test_by_id_priority() {
        assert_eq!(DeviceFinder::by_id_priority("usb-Apple_Inc._Magic_Keyboard-event-kbd"), Some(100));
        assert_eq!(DeviceFinder::by_id_priority("usb-Some_Keyboard-if01-event-joystick"), Some(50));
        assert_eq!(DeviceFinder::by_id_priority("usb-Razer_Mouse-event-kbd"), None);
        assert_eq!(DeviceFinder::by_id_priority("usb-Apple_Inc._Magic_Keyboard-kbd"), None);
    }

    #[test]
    fn test_empty_input_dir_finds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let result = DeviceFinder::auto_find_keyboard(dir.path());
        assert!(matches!(result, Err(FkeyError::DeviceNotFound(_))));
    }
}
