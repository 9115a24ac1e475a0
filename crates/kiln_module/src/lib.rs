//! Kiln Module Boundary
//!
//! Everything that crosses between the host and a reloadable application
//! module:
//! - The `#[repr(C)]` table and capability types
//! - Loaders (dynamic library and in-process)
//! - Identity tokens for staleness checks
//! - The binding that validates and owns a loaded module
//! - The app-side `App` trait and `export_app!` macro

pub mod abi;
pub mod binding;
pub mod error;
pub mod export;
pub mod identity;
pub mod loader;

pub use abi::{
    AppApi, DrawSubmission, HostCapabilities, HostInfo, IconImage, LogLevel, NativeHandleKind,
    NativeWindowHandle, PixelFormat, SurfaceDescription, UpdateSignal, ABI_VERSION,
    LAYOUT_FINGERPRINT,
};
pub use binding::{BoundApi, ModuleBinding};
pub use error::ModuleError;
pub use export::{App, AppHost};
pub use identity::ModuleIdentity;
pub use loader::{DylibLoader, DylibModule, LoadedModule, ModuleLoader, StaticLoader, StaticModule};
