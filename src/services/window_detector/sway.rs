use crate::error::Result;
use crate::events::WindowInfo;
use crate::fkey_error;
use std::process::Command;

pub struct SwayDetector;

impl SwayDetector {
    pub fn new() -> Self {
        Self
    }

    fn tree() -> Result<String> {
        let output = Command::new("swaymsg")
            .args(["-r", "-t", "get_tree"])
            .output()
            .map_err(|e| fkey_error!(service_unavailable, "swaymsg не найден: {}", e))?;

        if !output.status.success() {
            return Err(fkey_error!(service_unavailable, "swaymsg вернул ошибку"));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    pub async fn test(&self) -> Result<()> {
        Self::tree().map(|_| ())
    }

    pub async fn get_active_window(&self) -> Result<WindowInfo> {
        let tree = Self::tree()?;
        Self::parse_focused(&tree)
            .ok_or_else(|| fkey_error!(service_unavailable, "Активное окно в Sway не найдено"))
    }

    /// Окно с `"focused":true` из компактного вывода `swaymsg -r -t get_tree`
    pub fn parse_focused(tree: &str) -> Option<WindowInfo> {
        let node = focused_node(tree)?;

        let title = string_field(node, "name").unwrap_or_default();
        // у XWayland-окон app_id равен null, класс лежит в window_properties
        let class = string_field(node, "app_id")
            .or_else(|| string_field(node, "class"))
            .unwrap_or_default();
        let window = WindowInfo::new(title).with_class(class);

        Some(match number_field(node, "pid") {
            Some(pid) => window.with_pid(pid),
            None => window,
        })
    }
}

fn focused_node(tree: &str) -> Option<&str> {
    const MARKER: &str = "\"focused\":true";

    let bytes = tree.as_bytes();
    let mut starts: Vec<usize> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut focused: Option<(usize, usize)> = None;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match b {
            b'"' => {
                if focused.is_none() && tree[i..].starts_with(MARKER) {
                    focused = starts.last().map(|&start| (start, starts.len()));
                }
                in_string = true;
            }
            b'{' => starts.push(i),
            b'}' => {
                let start = starts.pop()?;
                if let Some((focused_start, depth)) = focused {
                    if start == focused_start && starts.len() + 1 == depth {
                        return Some(&tree[start..=i]);
                    }
                }
            }
            _ => {}
        }
    }
    None
}

fn string_field(node: &str, key: &str) -> Option<String> {
    let marker = format!("\"{}\":\"", key);
    let start = node.find(&marker)? + marker.len();

    let mut value = String::new();
    let mut chars = node[start..].chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => return Some(value),
            '\\' => value.push(chars.next()?),
            c => value.push(c),
        }
    }
    None
}

fn number_field(node: &str, key: &str) -> Option<u32> {
    let marker = format!("\"{}\":", key);
    let start = node.find(&marker)? + marker.len();
    let digits: String = node[start..].chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TREE: &str = concat!(
        r#"{"id":1,"name":"root","focused":false,"nodes":[{"id":4,"name":"1","type":"workspace","focused":false,"nodes":["#,
        r#"{"id":7,"name":"Other","focused":false,"app_id":"foot","pid":10,"nodes":[]},"#,
        r#"{"id":8,"name":"Doc {draft} \"v2\"","focused":true,"rect":{"x":0},"app_id":"org.gnome.Evince","pid":4242,"nodes":[]}"#,
        r#"]}]}"#
    );

    #[test]
    fn test_parse_focused_wayland_window() {
        let window = SwayDetector::parse_focused(TREE).unwrap();
        assert_eq!(window.title, "Doc {draft} \"v2\"");
        assert_eq!(window.class, "org.gnome.Evince");
        assert_eq!(window.pid, Some(4242));
    }

    #[test]
    fn test_parse_focused_xwayland_window() {
        let tree = r#"{"nodes":[{"name":"Steam","focused":true,"app_id":null,"pid":77,"window_properties":{"class":"Steam","title":"Steam"},"nodes":[]}]}"#;
        let window = SwayDetector::parse_focused(tree).unwrap();
        assert_eq!(window.class, "Steam");
        assert_eq!(window.pid, Some(77));
    }

    #[test]
    fn test_no_focused_window() {
        assert!(SwayDetector::parse_focused(r#"{"focused":false,"nodes":[]}"#).is_none());
    }
}
