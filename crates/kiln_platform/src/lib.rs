//! Kiln Platform Layer
//!
//! The host's view of the OS window and the render backend: a small
//! [`Platform`] trait the capability table forwards to, a headless
//! implementation for tests and batch runs, and the winit-backed window.

pub mod headless;
pub mod translate;
pub mod window;

use kiln_module::{NativeWindowHandle, SurfaceDescription};
use kiln_services::CursorKind;

pub use headless::HeadlessPlatform;
pub use translate::{map_key, map_mouse_button, translate_device_event, translate_window_event};
pub use window::{window_attributes, WinitPlatform};

/// One RGBA8 image of the window icon, copied out of the module's memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowIcon {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Services the host exposes to the application module.
pub trait Platform {
    fn surface(&self) -> SurfaceDescription;

    fn native_window(&self) -> NativeWindowHandle;

    /// Returns false if the platform refused the request.
    fn set_mouse_locked(&mut self, locked: bool) -> bool;

    fn set_cursor(&mut self, cursor: CursorKind);

    fn set_window_title(&mut self, title: &str);

    /// The same icon at one or more sizes. Empty clears the icon.
    fn set_window_icon(&mut self, icons: &[WindowIcon]);

    /// Opaque draw data for the render backend.
    fn submit_draw(&mut self, tag: u32, bytes: &[u8]);
}
