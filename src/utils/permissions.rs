use crate::config::Config;
use std::fs::OpenOptions;
use std::path::Path;
use tracing::{info, warn};

/// Итог диагностики прав доступа
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionReport {
    pub fnmode_writable: bool,
    pub input_readable: bool,
}

impl PermissionReport {
    pub fn is_complete(&self) -> bool {
        self.fnmode_writable && self.input_readable
    }
}

/// Проверить права доступа и вывести подсказки; никогда не прерывает запуск
pub fn check_permissions(config: &Config) -> PermissionReport {
    info!("Проверка прав доступа...");

    let report = PermissionReport {
        fnmode_writable: check_fnmode_access(&config.device.fnmode_path),
        input_readable: check_input_devices_access(Path::new("/dev/input")),
    };

    if !report.is_complete() {
        for line in get_setup_commands(&config.device.fnmode_path) {
            warn!("   {}", line);
        }
    }

    check_not_root();
    report
}

fn check_fnmode_access(path: &Path) -> bool {
    if !path.exists() {
        warn!("{} не существует: модуль hid_apple не загружен?", path.display());
        return false;
    }

    match OpenOptions::new().write(true).open(path) {
        Ok(_) => {
            info!("Доступ на запись к {} подтвержден", path.display());
            true
        }
        Err(e) => {
            warn!("Нет доступа на запись к {}: {}", path.display(), e);
            false
        }
    }
}

fn check_input_devices_access(input_dir: &Path) -> bool {
    match std::fs::read_dir(input_dir) {
        Ok(_) => {
            info!("Доступ к {} подтвержден", input_dir.display());
            true
        }
        Err(e) => {
            warn!(
                "Нет доступа к {}: {}. Жест Fn будет недоступен",
                input_dir.display(),
                e
            );
            false
        }
    }
}

fn check_not_root() {
    match std::env::var("USER") {
        Ok(user) if user == "root" => {
            warn!("⚠️  Приложение запущено от имени root!");
            warn!("   Рекомендуется выдать права через группу 'input' и правило udev для fnmode");
        }
        Ok(user) => info!("Приложение запущено от имени пользователя: {}", user),
        Err(_) => warn!("Не удалось определить пользователя"),
    }
}

/// Рекомендуемые команды для настройки прав доступа
pub fn get_setup_commands(fnmode_path: &Path) -> Vec<String> {
    vec![
        "# Чтение событий клавиатуры (жест Fn):".to_string(),
        "sudo usermod -a -G input $USER".to_string(),
        "".to_string(),
        "# Запись режима функциональных клавиш:".to_string(),
        format!(
            "echo 'ACTION==\"add\", SUBSYSTEM==\"module\", KERNEL==\"hid_apple\", RUN+=\"/bin/chmod g+w,o+w {}\"' | sudo tee /etc/udev/rules.d/90-fkey-switcher.rules",
            fnmode_path.display()
        ),
        "sudo udevadm control --reload-rules && sudo modprobe -r hid_apple && sudo modprobe hid_apple".to_string(),
        "".to_string(),
        "# После выполнения команд перезайдите в систему".to_string(),
    ]
}
