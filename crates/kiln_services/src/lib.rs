//! Kiln Services Layer
//!
//! Input state shared with the application module, the event vocabulary the
//! platform feeds in, the double-buffered snapshot, and host settings.

pub mod event;
pub mod input;
pub mod settings;
pub mod snapshot;

pub use event::InputEvent;
pub use input::{AppInput, BtnState, CursorKind, Key, KeyboardState, MouseButton, MouseState};
pub use settings::{HostConfig, SettingsError, WindowSettings};
pub use snapshot::InputBuffer;
