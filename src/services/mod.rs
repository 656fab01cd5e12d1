pub mod capability;
pub mod device_gateway;
pub mod event_bus;
pub mod gesture_detector;
pub mod keyboard_listener;
pub mod keycode_map;
pub mod live_source;
pub mod runtime;
pub mod session_monitor;
pub mod switch_engine;
pub mod window_detector;

#[cfg(test)]
pub mod testing;

pub use capability::create_capability_probe;
pub use device_gateway::create_device_gateway;
pub use event_bus::{EventBus, StatusReporter};
pub use keyboard_listener::create_keyboard_listener;
pub use live_source::TaskSource;
pub use runtime::{engine_channel, EngineHandle, EngineRuntime};
pub use session_monitor::create_session_monitor;
pub use switch_engine::{EngineParts, SwitchEngine};
pub use window_detector::create_window_detector;
