//! The capability table handed to the application module
//!
//! Queries (surface, native window) are answered immediately. Requests that
//! change window state are queued and applied by the host once the module
//! call returns, so the platform is never mutated in the middle of a frame.

use std::cell::{Ref, RefCell, RefMut};
use std::ffi::c_void;

use kiln_module::{
    DrawSubmission, HostCapabilities, IconImage, LogLevel, NativeWindowHandle, SurfaceDescription,
};
use kiln_platform::{Platform, WindowIcon};
use kiln_services::CursorKind;

#[derive(Debug, Clone, PartialEq)]
enum Request {
    MouseLock(bool),
    Cursor(CursorKind),
    Title(String),
    Icon(Vec<WindowIcon>),
    Draw { tag: u32, bytes: Vec<u8> },
}

pub struct CapabilityBridge<P: Platform> {
    platform: RefCell<P>,
    pending: RefCell<Vec<Request>>,
}

impl<P: Platform> CapabilityBridge<P> {
    /// Boxed so the context pointer in [`table`](Self::table) stays put.
    pub fn new(platform: P) -> Box<Self> {
        Box::new(Self {
            platform: RefCell::new(platform),
            pending: RefCell::new(Vec::new()),
        })
    }

    pub fn table(&self) -> HostCapabilities {
        HostCapabilities {
            context: self as *const Self as *mut c_void,
            get_surface: get_surface::<P>,
            set_mouse_locked: set_mouse_locked::<P>,
            set_cursor: set_cursor::<P>,
            set_window_title: set_window_title::<P>,
            get_native_window: get_native_window::<P>,
            submit_draw: submit_draw::<P>,
            set_window_icon: set_window_icon::<P>,
            log_message: log_message::<P>,
        }
    }

    pub fn platform(&self) -> Ref<'_, P> {
        self.platform.borrow()
    }

    pub fn platform_mut(&self) -> RefMut<'_, P> {
        self.platform.borrow_mut()
    }

    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Apply queued requests in order. Returns the mouse lock state the
    /// platform accepted last, if any lock request was made.
    pub fn flush(&self) -> Option<bool> {
        let requests = std::mem::take(&mut *self.pending.borrow_mut());
        let mut platform = self.platform.borrow_mut();
        let mut lock = None;

        for request in requests {
            match request {
                Request::MouseLock(locked) => {
                    if platform.set_mouse_locked(locked) {
                        lock = Some(locked);
                    }
                }
                Request::Cursor(cursor) => platform.set_cursor(cursor),
                Request::Title(title) => platform.set_window_title(&title),
                Request::Icon(icons) => platform.set_window_icon(&icons),
                Request::Draw { tag, bytes } => platform.submit_draw(tag, &bytes),
            }
        }
        lock
    }

    fn queue(&self, request: Request) {
        self.pending.borrow_mut().push(request);
    }
}

/// # Safety
/// `context` must come from `CapabilityBridge::<P>::table` and the bridge
/// must still be alive.
unsafe fn bridge<'a, P: Platform>(context: *mut c_void) -> Option<&'a CapabilityBridge<P>> {
    // SAFETY: guaranteed by the caller.
    unsafe { (context as *const CapabilityBridge<P>).as_ref() }
}

unsafe fn utf8<'a>(ptr: *const u8, len: usize) -> std::borrow::Cow<'a, str> {
    if ptr.is_null() || len == 0 {
        return "".into();
    }
    // SAFETY: the module passes a pointer/length pair from a live `&str`.
    String::from_utf8_lossy(unsafe { std::slice::from_raw_parts(ptr, len) })
}

unsafe extern "C" fn get_surface<P: Platform>(context: *mut c_void) -> SurfaceDescription {
    unsafe { bridge::<P>(context) }
        .and_then(|b| b.platform.try_borrow().ok().map(|p| p.surface()))
        .unwrap_or_default()
}

unsafe extern "C" fn get_native_window<P: Platform>(context: *mut c_void) -> NativeWindowHandle {
    unsafe { bridge::<P>(context) }
        .and_then(|b| b.platform.try_borrow().ok().map(|p| p.native_window()))
        .unwrap_or_default()
}

unsafe extern "C" fn set_mouse_locked<P: Platform>(context: *mut c_void, locked: bool) {
    if let Some(bridge) = unsafe { bridge::<P>(context) } {
        bridge.queue(Request::MouseLock(locked));
    }
}

unsafe extern "C" fn set_cursor<P: Platform>(context: *mut c_void, cursor: u32) {
    let Some(bridge) = (unsafe { bridge::<P>(context) }) else {
        return;
    };
    match CursorKind::from_raw(cursor) {
        Some(cursor) => bridge.queue(Request::Cursor(cursor)),
        None => tracing::warn!(cursor, "unknown cursor kind requested"),
    }
}

unsafe extern "C" fn set_window_title<P: Platform>(
    context: *mut c_void,
    title: *const u8,
    len: usize,
) {
    if let Some(bridge) = unsafe { bridge::<P>(context) } {
        let title = unsafe { utf8(title, len) }.into_owned();
        bridge.queue(Request::Title(title));
    }
}

unsafe extern "C" fn submit_draw<P: Platform>(context: *mut c_void, submission: DrawSubmission) {
    if let Some(bridge) = unsafe { bridge::<P>(context) } {
        // Copied now: the bytes usually live in the module's frame scratch.
        let bytes = unsafe { submission.bytes() }.to_vec();
        bridge.queue(Request::Draw {
            tag: submission.tag,
            bytes,
        });
    }
}

unsafe extern "C" fn set_window_icon<P: Platform>(
    context: *mut c_void,
    images: *const IconImage,
    count: usize,
) {
    let Some(bridge) = (unsafe { bridge::<P>(context) }) else {
        return;
    };
    let images = if images.is_null() || count == 0 {
        &[][..]
    } else {
        // SAFETY: the module passes a pointer/length pair from a live slice.
        unsafe { std::slice::from_raw_parts(images, count) }
    };
    let mut icons = Vec::with_capacity(images.len());
    for image in images {
        // SAFETY: each image describes memory the module keeps alive for this call.
        match unsafe { image.rgba() } {
            Some(rgba) => icons.push(WindowIcon {
                width: image.width,
                height: image.height,
                rgba: rgba.to_vec(),
            }),
            None => tracing::warn!(
                width = image.width,
                height = image.height,
                "empty window icon image ignored"
            ),
        }
    }
    if icons.is_empty() && !images.is_empty() {
        return;
    }
    bridge.queue(Request::Icon(icons));
}

unsafe extern "C" fn log_message<P: Platform>(
    _context: *mut c_void,
    level: LogLevel,
    message: *const u8,
    len: usize,
) {
    let message = unsafe { utf8(message, len) };
    match level {
        LogLevel::Error => tracing::error!(target: "kiln::app", "{message}"),
        LogLevel::Warn => tracing::warn!(target: "kiln::app", "{message}"),
        LogLevel::Info => tracing::info!(target: "kiln::app", "{message}"),
        LogLevel::Debug => tracing::debug!(target: "kiln::app", "{message}"),
        LogLevel::Trace => tracing::trace!(target: "kiln::app", "{message}"),
    }
}
