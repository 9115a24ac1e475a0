use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("failed to load module {path}: {reason}")]
    ModuleLoadFailed { path: PathBuf, reason: String },

    #[error("module is missing required entry point `{0}`")]
    MissingEntryPoint(String),

    #[error("module ABI mismatch in {field}: expected {expected:#x}, found {found:#x}")]
    AbiMismatch {
        field: &'static str,
        expected: u64,
        found: u64,
    },

    #[error("failed to shadow-copy module {path}: {source}")]
    ShadowCopyFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read identity of module {path}: {source}")]
    Identity {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
