//! Application side of the boundary
//!
//! An application implements [`App`] and invokes [`export_app!`](crate::export_app)
//! once. The macro emits the factory export; the generic shims below turn
//! the raw C calls into safe method calls and keep panics from unwinding
//! into the host.

use std::ffi::c_void;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;

use kiln_core::{Arena, Scratch, ScratchStack};
use kiln_services::{AppInput, CursorKind};

use crate::abi::{
    AppApi, DrawSubmission, HostCapabilities, HostInfo, IconImage, LogLevel, NativeWindowHandle,
    SurfaceDescription, UpdateSignal, ABI_VERSION, LAYOUT_FINGERPRINT,
};

/// Safe view of what the host passed to the current call.
#[derive(Clone, Copy)]
pub struct AppHost<'a> {
    info: &'a HostInfo,
    caps: &'a HostCapabilities,
}

impl<'a> AppHost<'a> {
    /// # Safety
    /// Both pointers must be the ones the host passed to the current entry
    /// point call, and the result must not outlive that call.
    pub unsafe fn from_raw(info: *const HostInfo, caps: *const HostCapabilities) -> Option<Self> {
        // SAFETY: guaranteed by the caller.
        let (info, caps) = unsafe { (info.as_ref()?, caps.as_ref()?) };
        Some(Self { info, caps })
    }

    /// Run `f` with the persistent arena.
    pub fn with_persistent<R>(&self, f: impl FnOnce(&mut Arena) -> R) -> Option<R> {
        // SAFETY: the host does not touch the arena while a module call runs.
        let arena = unsafe { self.info.persistent.as_mut()? };
        Some(f(arena))
    }

    pub fn scratch(&self) -> Option<&'a ScratchStack> {
        // SAFETY: valid for the duration of the call.
        unsafe { self.info.scratch.as_ref() }
    }

    /// The scratch the host opened around this call.
    pub fn frame_scratch(&self) -> Option<&'a Scratch<'a>> {
        let frame = self.info.frame_scratch as *const Scratch<'a>;
        // SAFETY: the host keeps the guard open until the call returns.
        unsafe { frame.as_ref() }
    }

    pub fn surface(&self) -> SurfaceDescription {
        // SAFETY: capability functions accept their own context.
        unsafe { (self.caps.get_surface)(self.caps.context) }
    }

    pub fn set_mouse_locked(&self, locked: bool) {
        unsafe { (self.caps.set_mouse_locked)(self.caps.context, locked) }
    }

    pub fn set_cursor(&self, cursor: CursorKind) {
        unsafe { (self.caps.set_cursor)(self.caps.context, cursor as u32) }
    }

    pub fn set_window_title(&self, title: &str) {
        unsafe { (self.caps.set_window_title)(self.caps.context, title.as_ptr(), title.len()) }
    }

    pub fn native_window(&self) -> NativeWindowHandle {
        unsafe { (self.caps.get_native_window)(self.caps.context) }
    }

    /// Hand `bytes` to the render backend. They are copied before this returns.
    pub fn submit_draw(&self, tag: u32, bytes: &[u8]) {
        let submission = DrawSubmission {
            tag,
            data: bytes.as_ptr(),
            len: bytes.len(),
        };
        unsafe { (self.caps.submit_draw)(self.caps.context, submission) }
    }

    /// Replace the window icon. Pass the same icon at several sizes and the
    /// platform picks the best fit; an empty slice clears it.
    pub fn set_window_icon(&self, images: &[IconImage]) {
        unsafe { (self.caps.set_window_icon)(self.caps.context, images.as_ptr(), images.len()) }
    }

    /// Log through the host's subscriber. A module has its own copy of
    /// `tracing` with no subscriber installed.
    pub fn log(&self, level: LogLevel, message: &str) {
        unsafe { (self.caps.log_message)(self.caps.context, level, message.as_ptr(), message.len()) }
    }
}

/// A reloadable application.
///
/// `Self` lives in the host's persistent arena and survives reloads as raw
/// bytes. Keep it plain data: no heap-owning fields and nothing pointing into
/// the module's code or statics, which disappear on reload.
pub trait App: Sized {
    fn init(host: &AppHost<'_>) -> Self;

    fn update(&mut self, host: &AppHost<'_>, input: &AppInput) -> UpdateSignal;

    /// The module was rebound; `self` was created by a previous build.
    fn reloaded(&mut self, _host: &AppHost<'_>) {}

    fn shutdown(&mut self, _host: &AppHost<'_>) {}
}

/// The table for `A`. Called by the function `export_app!` generates.
pub fn app_api<A: App>() -> AppApi {
    AppApi {
        abi_version: ABI_VERSION,
        layout: LAYOUT_FINGERPRINT,
        init: Some(init_shim::<A>),
        update: Some(update_shim::<A>),
        shutdown: Some(shutdown_shim::<A>),
        reloaded: Some(reloaded_shim::<A>),
    }
}

unsafe extern "C" fn init_shim<A: App>(
    info: *const HostInfo,
    caps: *const HostCapabilities,
) -> *mut c_void {
    // SAFETY: called by the host with its own context.
    let Some(host) = (unsafe { AppHost::from_raw(info, caps) }) else {
        return ptr::null_mut();
    };
    let Ok(app) = catch_unwind(AssertUnwindSafe(|| A::init(&host))) else {
        host.log(LogLevel::Error, "init panicked");
        return ptr::null_mut();
    };
    match host.with_persistent(|arena| arena.alloc_value(app)) {
        Some(Ok(state)) => state.as_ptr().cast(),
        Some(Err(err)) => {
            host.log(LogLevel::Error, &format!("could not allocate app state: {err}"));
            ptr::null_mut()
        }
        None => ptr::null_mut(),
    }
}

unsafe extern "C" fn update_shim<A: App>(
    info: *const HostInfo,
    caps: *const HostCapabilities,
    state: *mut c_void,
    input: *const AppInput,
) -> UpdateSignal {
    // SAFETY: `state` came from `init_shim::<A>`; the rest from the host.
    let parts = unsafe {
        (
            AppHost::from_raw(info, caps),
            state.cast::<A>().as_mut(),
            input.as_ref(),
        )
    };
    let (Some(host), Some(app), Some(input)) = parts else {
        return UpdateSignal::Stop;
    };
    match catch_unwind(AssertUnwindSafe(|| app.update(&host, input))) {
        Ok(signal) => signal,
        Err(_) => {
            host.log(LogLevel::Error, "update panicked; stopping");
            UpdateSignal::Stop
        }
    }
}

unsafe extern "C" fn shutdown_shim<A: App>(
    info: *const HostInfo,
    caps: *const HostCapabilities,
    state: *mut c_void,
) {
    // SAFETY: as in `update_shim`.
    let parts = unsafe { (AppHost::from_raw(info, caps), state.cast::<A>().as_mut()) };
    if let (Some(host), Some(app)) = parts {
        if catch_unwind(AssertUnwindSafe(|| app.shutdown(&host))).is_err() {
            host.log(LogLevel::Error, "shutdown panicked");
        }
    }
}

unsafe extern "C" fn reloaded_shim<A: App>(
    info: *const HostInfo,
    caps: *const HostCapabilities,
    state: *mut c_void,
) {
    // SAFETY: as in `update_shim`.
    let parts = unsafe { (AppHost::from_raw(info, caps), state.cast::<A>().as_mut()) };
    if let (Some(host), Some(app)) = parts {
        if catch_unwind(AssertUnwindSafe(|| app.reloaded(&host))).is_err() {
            host.log(LogLevel::Error, "reloaded hook panicked");
        }
    }
}

/// Export `$app` as this module's application.
///
/// ```ignore
/// struct Game { frames: u64 }
/// impl kiln_module::App for Game { /* ... */ }
/// kiln_module::export_app!(Game);
/// ```
#[macro_export]
macro_rules! export_app {
    ($app:ty) => {
        #[no_mangle]
        pub extern "C" fn kiln_get_app_api() -> $crate::abi::AppApi {
            $crate::export::app_api::<$app>()
        }
    };
}
