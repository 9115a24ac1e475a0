//! Window management
//!
//! Cross-platform window via winit. Window creation itself happens in the
//! runtime's `ApplicationHandler::resumed`, as winit 0.30 requires.

use std::ffi::c_void;
use std::sync::Arc;

use kiln_module::{NativeHandleKind, NativeWindowHandle, PixelFormat, SurfaceDescription};
use kiln_services::{CursorKind, WindowSettings};
use winit::raw_window_handle::{
    HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle,
};
use winit::window::{CursorGrabMode, CursorIcon, Fullscreen, Icon, Window};

use crate::{Platform, WindowIcon};

/// Create window attributes from settings
pub fn window_attributes(settings: &WindowSettings) -> winit::window::WindowAttributes {
    let attrs = Window::default_attributes()
        .with_title(settings.title.clone())
        .with_inner_size(winit::dpi::LogicalSize::new(
            settings.width,
            settings.height,
        ));
    if settings.fullscreen {
        attrs.with_fullscreen(Some(Fullscreen::Borderless(None)))
    } else {
        attrs
    }
}

pub struct WinitPlatform {
    window: Arc<Window>,
    mouse_locked: bool,
    submitted: u64,
}

impl WinitPlatform {
    pub fn new(window: Arc<Window>) -> Self {
        Self {
            window,
            mouse_locked: false,
            submitted: 0,
        }
    }

    #[inline]
    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    /// Draw submissions received so far.
    #[inline]
    pub fn submitted(&self) -> u64 {
        self.submitted
    }
}

impl Platform for WinitPlatform {
    fn surface(&self) -> SurfaceDescription {
        let size = self.window.inner_size();
        SurfaceDescription {
            width: size.width,
            height: size.height,
            scale_factor: self.window.scale_factor() as f32,
            format: PixelFormat::Bgra8UnormSrgb,
            native: self.native_window(),
        }
    }

    fn native_window(&self) -> NativeWindowHandle {
        let mut handle = NativeWindowHandle::default();

        if let Ok(window) = self.window.window_handle() {
            let (kind, ptr) = match window.as_raw() {
                RawWindowHandle::Win32(h) => (NativeHandleKind::Win32, h.hwnd.get() as *mut c_void),
                RawWindowHandle::AppKit(h) => (NativeHandleKind::AppKit, h.ns_view.as_ptr()),
                RawWindowHandle::Xlib(h) => (NativeHandleKind::Xlib, h.window as usize as *mut c_void),
                RawWindowHandle::Xcb(h) => (NativeHandleKind::Xcb, h.window.get() as usize as *mut c_void),
                RawWindowHandle::Wayland(h) => (NativeHandleKind::Wayland, h.surface.as_ptr()),
                _ => return handle,
            };
            handle.kind = kind;
            handle.window = ptr;
        }

        if let Ok(display) = self.window.display_handle() {
            handle.display = match display.as_raw() {
                RawDisplayHandle::Xlib(d) => d.display.map_or(std::ptr::null_mut(), |p| p.as_ptr()),
                RawDisplayHandle::Xcb(d) => d.connection.map_or(std::ptr::null_mut(), |p| p.as_ptr()),
                RawDisplayHandle::Wayland(d) => d.display.as_ptr(),
                _ => std::ptr::null_mut(),
            };
        }

        handle
    }

    fn set_mouse_locked(&mut self, locked: bool) -> bool {
        if locked == self.mouse_locked {
            return true;
        }

        let result = if locked {
            // Not every platform can lock; confining is the closest fallback.
            self.window
                .set_cursor_grab(CursorGrabMode::Locked)
                .or_else(|_| self.window.set_cursor_grab(CursorGrabMode::Confined))
        } else {
            self.window.set_cursor_grab(CursorGrabMode::None)
        };

        match result {
            Ok(()) => {
                self.window.set_cursor_visible(!locked);
                self.mouse_locked = locked;
                tracing::debug!(locked, "mouse lock changed");
                true
            }
            Err(err) => {
                tracing::warn!(locked, %err, "cursor grab rejected");
                false
            }
        }
    }

    fn set_cursor(&mut self, cursor: CursorKind) {
        let icon = match cursor {
            CursorKind::Hidden => {
                self.window.set_cursor_visible(false);
                return;
            }
            CursorKind::Default => CursorIcon::Default,
            CursorKind::Pointer => CursorIcon::Pointer,
            CursorKind::Text => CursorIcon::Text,
            CursorKind::Crosshair => CursorIcon::Crosshair,
            CursorKind::Move => CursorIcon::Move,
            CursorKind::ResizeHorizontal => CursorIcon::EwResize,
            CursorKind::ResizeVertical => CursorIcon::NsResize,
            CursorKind::NotAllowed => CursorIcon::NotAllowed,
            CursorKind::Wait => CursorIcon::Wait,
        };
        self.window.set_cursor_visible(!self.mouse_locked);
        self.window.set_cursor(icon);
    }

    fn set_window_title(&mut self, title: &str) {
        self.window.set_title(title);
    }

    fn set_window_icon(&mut self, icons: &[WindowIcon]) {
        // winit takes a single image and scales it; the largest scales best.
        let Some(largest) = icons.iter().max_by_key(|icon| u64::from(icon.width) * u64::from(icon.height)) else {
            self.window.set_window_icon(None);
            return;
        };
        match Icon::from_rgba(largest.rgba.clone(), largest.width, largest.height) {
            Ok(icon) => self.window.set_window_icon(Some(icon)),
            Err(err) => tracing::warn!(%err, "window icon rejected"),
        }
    }

    fn submit_draw(&mut self, tag: u32, bytes: &[u8]) {
        // No render backend is attached; the submission is accounted for and
        // the window asked to present again.
        self.submitted += 1;
        tracing::trace!(tag, len = bytes.len(), "draw submitted");
        self.window.request_redraw();
    }
}
