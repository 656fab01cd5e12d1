use crate::error::Result;
use crate::events::WindowInfo;
use crate::fkey_error;
use std::collections::HashMap;
use std::process::Command;
use tracing::debug;

pub struct KdotoolDetector;

/// Под sudo kdotool нужно окружение сессии исходного пользователя
fn build_env_overrides() -> HashMap<String, String> {
    let mut env_vars = HashMap::new();

    if std::env::var("USER").unwrap_or_default() == "root" {
        if let Ok(sudo_user) = std::env::var("SUDO_USER") {
            if let Ok(output) = Command::new("id").args(["-u", &sudo_user]).output() {
                let uid = String::from_utf8_lossy(&output.stdout).trim().to_string();
                let user_runtime_dir = format!("/run/user/{}", uid);

                debug!("Окружение сессии пользователя {}: uid={}", sudo_user, uid);
                env_vars.insert(
                    "DBUS_SESSION_BUS_ADDRESS".to_string(),
                    format!("unix:path={}/bus", user_runtime_dir),
                );
                env_vars.insert("XDG_RUNTIME_DIR".to_string(), user_runtime_dir);
                env_vars.insert("USER".to_string(), sudo_user);
            }
        }
    }

    env_vars
}

impl KdotoolDetector {
    pub fn new() -> Self {
        Self
    }

    fn run(args: &[&str]) -> Result<String> {
        let mut cmd = match std::env::var("SUDO_USER") {
            Ok(sudo_user) => {
                let mut cmd = Command::new("sudo");
                cmd.args(["-E", "-u", &sudo_user, "kdotool"]);
                cmd
            }
            Err(_) => Command::new("kdotool"),
        };
        cmd.args(args).envs(build_env_overrides());

        let output = cmd
            .output()
            .map_err(|e| fkey_error!(service_unavailable, "kdotool не найден: {}", e))?;
        if !output.status.success() {
            return Err(fkey_error!(
                service_unavailable,
                "kdotool {}: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub async fn test(&self) -> Result<()> {
        let window_id = Self::run(&["getactivewindow"])?;
        Self::run(&["getwindowname", &window_id]).map(|_| ())
    }

    pub async fn get_active_window(&self) -> Result<WindowInfo> {
        let window_id = Self::run(&["getactivewindow"])?;
        let title = Self::run(&["getwindowname", &window_id])?;
        let class = Self::run(&["getwindowclassname", &window_id]).unwrap_or_default();
        let pid = Self::run(&["getwindowpid", &window_id])
            .ok()
            .and_then(|p| p.parse().ok());

        let window = WindowInfo::new(title).with_class(class);
        Ok(match pid {
            Some(pid) => window.with_pid(pid),
            None => window,
        })
    }
}
