//! The C-compatible table exchanged with an application module.
//!
//! The host resolves exactly one symbol, [`GET_API_SYMBOL`], and calls it to
//! obtain an [`AppApi`]. Everything else travels through that table and the
//! two context structs passed to each entry point.

use std::ffi::c_void;
use std::mem::{align_of, size_of};
use std::ptr;

use kiln_core::{Arena, Scratch, ScratchStack};
use kiln_services::AppInput;

/// Bumped whenever the calling convention of the table changes.
pub const ABI_VERSION: u32 = 2;

/// Sizes and alignments of every type that crosses the boundary by pointer,
/// folded into one value. A module built against a different `kiln_core` or
/// `kiln_services` carries a different fingerprint even when nobody bumped
/// [`ABI_VERSION`].
pub const LAYOUT_FINGERPRINT: u64 = layout_fingerprint();

const fn layout_fingerprint() -> u64 {
    let parts = [
        size_of::<Arena>(),
        align_of::<Arena>(),
        size_of::<ScratchStack>(),
        align_of::<ScratchStack>(),
        size_of::<Scratch<'static>>(),
        align_of::<Scratch<'static>>(),
        size_of::<AppInput>(),
        align_of::<AppInput>(),
        size_of::<HostInfo>(),
        align_of::<HostInfo>(),
        size_of::<HostCapabilities>(),
        size_of::<SurfaceDescription>(),
        size_of::<IconImage>(),
        size_of::<AppApi>(),
    ];
    // FNV-1a over the words.
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    let mut i = 0;
    while i < parts.len() {
        hash ^= parts[i] as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        i += 1;
    }
    hash
}

pub const GET_API_NAME: &str = "kiln_get_app_api";
pub const GET_API_SYMBOL: &[u8] = b"kiln_get_app_api\0";

/// Returned by `update`.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSignal {
    Continue = 0,
    Stop = 1,
}

/// Host-owned memory handed to every entry point.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct HostInfo {
    /// The persistent arena. The application owns what it allocates here.
    pub persistent: *mut Arena,
    pub scratch: *const ScratchStack,
    /// Scratch opened by the host around this call. Valid only until it returns.
    pub frame_scratch: *const Scratch<'static>,
}

impl HostInfo {
    pub fn empty() -> Self {
        Self {
            persistent: ptr::null_mut(),
            scratch: ptr::null(),
            frame_scratch: ptr::null(),
        }
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PixelFormat {
    #[default]
    Unknown = 0,
    Bgra8UnormSrgb,
    Rgba8UnormSrgb,
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NativeHandleKind {
    #[default]
    None = 0,
    Win32,
    AppKit,
    Xlib,
    Xcb,
    Wayland,
}

/// OS window handle. `window` holds a pointer or an integer id depending on `kind`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeWindowHandle {
    pub kind: NativeHandleKind,
    pub window: *mut c_void,
    pub display: *mut c_void,
}

impl Default for NativeWindowHandle {
    fn default() -> Self {
        Self {
            kind: NativeHandleKind::None,
            window: ptr::null_mut(),
            display: ptr::null_mut(),
        }
    }
}

/// What the renderer would draw into.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SurfaceDescription {
    pub width: u32,
    pub height: u32,
    pub scale_factor: f32,
    pub format: PixelFormat,
    pub native: NativeWindowHandle,
}

/// Opaque draw data. The host forwards the bytes without interpreting them;
/// `tag` tells the backend how to read them.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DrawSubmission {
    pub tag: u32,
    pub data: *const u8,
    pub len: usize,
}

impl DrawSubmission {
    /// # Safety
    /// `data` must point to `len` readable bytes.
    pub unsafe fn bytes(&self) -> &[u8] {
        if self.data.is_null() || self.len == 0 {
            &[]
        } else {
            // SAFETY: guaranteed by the caller.
            unsafe { std::slice::from_raw_parts(self.data, self.len) }
        }
    }
}

/// One RGBA8 image, rows top to bottom. `pixels` holds `width * height * 4` bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct IconImage {
    pub width: u32,
    pub height: u32,
    pub pixels: *const u8,
}

impl IconImage {
    /// # Safety
    /// `pixels` must point to `width * height * 4` readable bytes.
    pub unsafe fn rgba(&self) -> Option<&[u8]> {
        let len = (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(4)?;
        if self.pixels.is_null() || len == 0 {
            return None;
        }
        // SAFETY: guaranteed by the caller.
        Some(unsafe { std::slice::from_raw_parts(self.pixels, len) })
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error = 0,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Host services callable from the module. `context` is passed back as the
/// first argument of every function.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct HostCapabilities {
    pub context: *mut c_void,
    pub get_surface: unsafe extern "C" fn(context: *mut c_void) -> SurfaceDescription,
    pub set_mouse_locked: unsafe extern "C" fn(context: *mut c_void, locked: bool),
    /// `cursor` is a [`CursorKind`](kiln_services::CursorKind) discriminant.
    pub set_cursor: unsafe extern "C" fn(context: *mut c_void, cursor: u32),
    pub set_window_title: unsafe extern "C" fn(context: *mut c_void, title: *const u8, len: usize),
    pub get_native_window: unsafe extern "C" fn(context: *mut c_void) -> NativeWindowHandle,
    pub submit_draw: unsafe extern "C" fn(context: *mut c_void, submission: DrawSubmission),
    /// `count` images of the same icon at different sizes; zero clears it.
    pub set_window_icon:
        unsafe extern "C" fn(context: *mut c_void, images: *const IconImage, count: usize),
    pub log_message:
        unsafe extern "C" fn(context: *mut c_void, level: LogLevel, message: *const u8, len: usize),
}

pub type InitFn =
    unsafe extern "C" fn(info: *const HostInfo, caps: *const HostCapabilities) -> *mut c_void;

pub type UpdateFn = unsafe extern "C" fn(
    info: *const HostInfo,
    caps: *const HostCapabilities,
    state: *mut c_void,
    input: *const AppInput,
) -> UpdateSignal;

pub type ShutdownFn =
    unsafe extern "C" fn(info: *const HostInfo, caps: *const HostCapabilities, state: *mut c_void);

pub type ReloadedFn = ShutdownFn;

pub type GetApiFn = unsafe extern "C" fn() -> AppApi;

/// The table returned by the module's single export.
///
/// `abi_version` and `layout` keep their offsets in every version so a
/// mismatched table can still be rejected safely.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct AppApi {
    pub abi_version: u32,
    pub layout: u64,
    pub init: Option<InitFn>,
    pub update: Option<UpdateFn>,
    pub shutdown: Option<ShutdownFn>,
    /// Called once after a rebind, before the next update.
    pub reloaded: Option<ReloadedFn>,
}

impl AppApi {
    pub fn empty() -> Self {
        Self {
            abi_version: ABI_VERSION,
            layout: LAYOUT_FINGERPRINT,
            init: None,
            update: None,
            shutdown: None,
            reloaded: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_matches_name() {
        assert_eq!(&GET_API_SYMBOL[..GET_API_SYMBOL.len() - 1], GET_API_NAME.as_bytes());
        assert_eq!(GET_API_SYMBOL.last(), Some(&0));
    }

    #[test]
    fn test_fingerprint_is_fixed_per_build() {
        assert_eq!(LAYOUT_FINGERPRINT, layout_fingerprint());
        assert_ne!(LAYOUT_FINGERPRINT, 0);
        assert_eq!(AppApi::empty().layout, LAYOUT_FINGERPRINT);
    }

    #[test]
    fn test_icon_image_rgba_len() {
        let pixels = [0u8; 2 * 3 * 4];
        let image = IconImage {
            width: 2,
            height: 3,
            pixels: pixels.as_ptr(),
        };
        assert_eq!(unsafe { image.rgba() }.map(<[u8]>::len), Some(24));

        let empty = IconImage {
            width: 0,
            ..image
        };
        assert!(unsafe { empty.rgba() }.is_none());
    }

    #[test]
    fn test_empty_submission_bytes() {
        let submission = DrawSubmission {
            tag: 7,
            data: ptr::null(),
            len: 12,
        };
        assert!(unsafe { submission.bytes() }.is_empty());
    }
}
