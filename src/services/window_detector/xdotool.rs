use crate::error::Result;
use crate::events::WindowInfo;
use crate::fkey_error;
use std::process::Command;
use tracing::debug;

pub struct XdotoolDetector;

impl XdotoolDetector {
    pub fn new() -> Self {
        Self
    }

    fn query(property: &str) -> Result<String> {
        let output = Command::new("xdotool")
            .args(["getactivewindow", property])
            .output()
            .map_err(|e| fkey_error!(service_unavailable, "xdotool не найден: {}", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(fkey_error!(service_unavailable, "xdotool {}: {}", property, stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub async fn test(&self) -> Result<()> {
        Self::query("getwindowname").map(|_| ())
    }

    pub async fn get_active_window(&self) -> Result<WindowInfo> {
        let title = Self::query("getwindowname")?;
        let class = Self::query("getwindowclassname").unwrap_or_default();
        let pid = Self::query("getwindowpid").ok().and_then(|p| p.parse().ok());
        debug!("xdotool: '{}' класс '{}' pid {:?}", title, class, pid);

        let window = WindowInfo::new(title).with_class(class);
        Ok(match pid {
            Some(pid) => window.with_pid(pid),
            None => window,
        })
    }
}
