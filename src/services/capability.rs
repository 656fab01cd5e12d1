use crate::utils::DeviceFinder;
use std::sync::Arc;
use tracing::info;

/// Проверка, разрешено ли процессу наблюдать глобальные события клавиатуры.
///
/// Вызывается из блокирующего пула: реализация может открывать устройства.
pub trait CapabilityProbe: Send + Sync {
    fn probe(&self) -> bool;
}

/// Factory function to create an appropriate probe based on the dry_run flag
pub fn create_capability_probe(device_path: &str, dry_run: bool) -> Arc<dyn CapabilityProbe> {
    if dry_run {
        Arc::new(DryRunProbe)
    } else {
        Arc::new(InputAccessProbe::new(device_path))
    }
}

/// Доступ есть, если хотя бы одна клавиатура в /dev/input открывается на чтение
pub struct InputAccessProbe {
    device_path: String,
}

impl InputAccessProbe {
    pub fn new(device_path: impl Into<String>) -> Self {
        let device_path = device_path.into();
        info!("Инициализация InputAccessProbe (устройство: {})", device_path);
        Self { device_path }
    }
}

impl CapabilityProbe for InputAccessProbe {
    fn probe(&self) -> bool {
        DeviceFinder::has_accessible_keyboard(&self.device_path)
    }
}

pub struct DryRunProbe;

impl CapabilityProbe for DryRunProbe {
    fn probe(&self) -> bool {
        true
    }
}
