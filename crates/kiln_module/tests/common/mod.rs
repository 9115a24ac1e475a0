//! Capability table that ignores every request.

use std::ffi::c_void;
use std::ptr;

use kiln_module::abi::{HostCapabilities, IconImage, LogLevel};
use kiln_module::{DrawSubmission, NativeWindowHandle, SurfaceDescription};

unsafe extern "C" fn no_surface(_: *mut c_void) -> SurfaceDescription {
    SurfaceDescription::default()
}
unsafe extern "C" fn no_lock(_: *mut c_void, _: bool) {}
unsafe extern "C" fn no_cursor(_: *mut c_void, _: u32) {}
unsafe extern "C" fn no_title(_: *mut c_void, _: *const u8, _: usize) {}
unsafe extern "C" fn no_window(_: *mut c_void) -> NativeWindowHandle {
    NativeWindowHandle::default()
}
unsafe extern "C" fn no_draw(_: *mut c_void, _: DrawSubmission) {}
unsafe extern "C" fn no_icon(_: *mut c_void, _: *const IconImage, _: usize) {}
unsafe extern "C" fn no_log(_: *mut c_void, _: LogLevel, _: *const u8, _: usize) {}

pub fn null_caps() -> HostCapabilities {
    HostCapabilities {
        context: ptr::null_mut(),
        get_surface: no_surface,
        set_mouse_locked: no_lock,
        set_cursor: no_cursor,
        set_window_title: no_title,
        get_native_window: no_window,
        submit_draw: no_draw,
        set_window_icon: no_icon,
        log_message: no_log,
    }
}
