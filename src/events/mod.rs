pub mod engine;
pub mod keyboard;
pub mod window;

pub use engine::{ChangeSource, DeviceOperation, EngineEvent, SessionEvent};
pub use keyboard::{KeyCode, KeyState, RawKeyEvent};
pub use window::{ForegroundApp, WindowInfo};
