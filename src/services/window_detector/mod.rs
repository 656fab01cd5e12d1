//! WindowDetector service: responsibility and boundaries
//!
//! This module and its submodules are responsible ONLY for detecting the foreground
//! application and sending `EngineInput::Foreground` when it changes. Rule lookup and
//! mode resolution belong to the SwitchEngine.

mod dry_run;
mod kdotool;
mod sway;
mod window_detector;
mod xdotool;
mod r#trait;

pub use self::r#trait::{create_window_detector, WindowDetectorTrait};
