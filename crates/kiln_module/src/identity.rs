//! Content-identity tokens

use std::path::Path;
use std::time::SystemTime;

use crate::error::ModuleError;

/// Modification time plus length of a module file. Two reads compare equal
/// while the file is untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleIdentity {
    modified: Option<SystemTime>,
    len: u64,
}

impl ModuleIdentity {
    /// Identity of a module with no backing file. Never goes stale.
    pub const UNTRACKED: Self = Self {
        modified: None,
        len: 0,
    };

    pub fn read(path: &Path) -> Result<Self, ModuleError> {
        let meta = std::fs::metadata(path).map_err(|source| ModuleError::Identity {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            modified: meta.modified().ok(),
            len: meta.len(),
        })
    }

    #[inline]
    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
