//! Module loaders
//!
//! A [`ModuleLoader`] turns a path into an opened module that can resolve the
//! single factory export. [`DylibLoader`] opens real dynamic libraries;
//! [`StaticLoader`] serves factories linked into the host executable, which
//! is how single-unit builds and tests run without a separate library.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use libloading::Library;

use crate::abi::{GetApiFn, GET_API_SYMBOL};
use crate::error::ModuleError;
use crate::identity::ModuleIdentity;

pub trait ModuleLoader {
    type Module: LoadedModule;

    /// Open the module at `path`. `generation` counts successful and failed
    /// load attempts and is unique per attempt.
    fn open(&mut self, path: &Path, generation: u64) -> Result<Self::Module, ModuleError>;

    fn identity(&self, path: &Path) -> Result<ModuleIdentity, ModuleError> {
        ModuleIdentity::read(path)
    }
}

pub trait LoadedModule {
    /// Resolve the factory export, if present.
    fn get_api(&self) -> Option<GetApiFn>;

    /// The file the code was actually loaded from.
    fn loaded_path(&self) -> &Path;
}

// ============================================================================
// Dynamic libraries
// ============================================================================

/// Loads modules with `libloading`.
///
/// The platform loader hands back the library it already has for a path it
/// has opened before (closing does not guarantee unloading), so a rebuilt
/// file at that path would never run. Without shadow copies a module path
/// is therefore loaded in place only once; every later attempt loads from
/// a copy unique to that attempt.
#[derive(Debug, Clone, Default)]
pub struct DylibLoader {
    shadow_copy: bool,
    shadow_dir: Option<PathBuf>,
    in_place_paths: HashSet<PathBuf>,
}

impl DylibLoader {
    /// Load the module file in place the first time, then from copies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a uniquely named copy so the original can be rebuilt while loaded.
    /// Copies go to `dir`, or the system temp dir when `None`.
    pub fn with_shadow_copies(dir: Option<PathBuf>) -> Self {
        Self {
            shadow_copy: true,
            shadow_dir: dir,
            in_place_paths: HashSet::new(),
        }
    }

    /// Whether `path` itself has been handed to the platform loader.
    pub fn opened_in_place(&self, path: &Path) -> bool {
        self.in_place_paths.contains(path)
    }

    fn shadow_path(&self, path: &Path, generation: u64) -> PathBuf {
        let dir = self.shadow_dir.clone().unwrap_or_else(std::env::temp_dir);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "module".into());
        let mut name = format!("{stem}-{}-{generation}", std::process::id());
        if let Some(ext) = path.extension() {
            name.push('.');
            name.push_str(&ext.to_string_lossy());
        }
        dir.join(name)
    }
}

impl ModuleLoader for DylibLoader {
    type Module = DylibModule;

    fn open(&mut self, path: &Path, generation: u64) -> Result<DylibModule, ModuleError> {
        let seen = !self.shadow_copy && self.opened_in_place(path);
        if seen {
            tracing::debug!(path = %path.display(), "module path opened before; loading a copy");
        }
        let shadow = if self.shadow_copy || seen {
            let copy = self.shadow_path(path, generation);
            std::fs::copy(path, &copy).map_err(|source| ModuleError::ShadowCopyFailed {
                path: path.to_path_buf(),
                source,
            })?;
            tracing::debug!(from = %path.display(), to = %copy.display(), "module shadow-copied");
            Some(copy)
        } else {
            None
        };
        let load_path = shadow.as_deref().unwrap_or(path);

        // SAFETY: loading runs the module's initializers. Modules are trusted
        // code built against this crate.
        let library = match unsafe { Library::new(load_path) } {
            Ok(library) => library,
            Err(err) => {
                if let Some(copy) = &shadow {
                    let _ = std::fs::remove_file(copy);
                }
                return Err(ModuleError::ModuleLoadFailed {
                    path: path.to_path_buf(),
                    reason: err.to_string(),
                });
            }
        };

        if shadow.is_none() {
            self.in_place_paths.insert(path.to_path_buf());
        }

        Ok(DylibModule {
            library: Some(library),
            path: load_path.to_path_buf(),
            shadow,
        })
    }
}

/// An open dynamic library. Dropping it unloads the code and removes the
/// shadow copy, if any.
pub struct DylibModule {
    library: Option<Library>,
    path: PathBuf,
    shadow: Option<PathBuf>,
}

impl LoadedModule for DylibModule {
    fn get_api(&self) -> Option<GetApiFn> {
        let library = self.library.as_ref()?;
        // SAFETY: the symbol is declared with this exact signature by `export_app!`.
        let symbol = unsafe { library.get::<GetApiFn>(GET_API_SYMBOL) }.ok()?;
        Some(*symbol)
    }

    fn loaded_path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DylibModule {
    fn drop(&mut self) {
        if let Some(library) = self.library.take() {
            if let Err(err) = library.close() {
                tracing::warn!(path = %self.path.display(), %err, "failed to unload module");
            }
        }
        if let Some(copy) = self.shadow.take() {
            if let Err(err) = std::fs::remove_file(&copy) {
                tracing::debug!(path = %copy.display(), %err, "shadow copy not removed");
            }
        }
    }
}

impl std::fmt::Debug for DylibModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DylibModule")
            .field("path", &self.path)
            .field("shadow", &self.shadow.is_some())
            .finish()
    }
}

// ============================================================================
// In-process modules
// ============================================================================

/// Serves factories registered in-process under a path.
///
/// Clones share one registry, so a test can keep a handle and swap the
/// registered factory while the host owns the loader.
#[derive(Clone, Default)]
pub struct StaticLoader {
    registry: Rc<RefCell<HashMap<PathBuf, Option<GetApiFn>>>>,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the factory served for `path`.
    pub fn register(&self, path: impl Into<PathBuf>, get_api: GetApiFn) {
        self.registry.borrow_mut().insert(path.into(), Some(get_api));
    }

    /// Serve a module at `path` that opens but exports nothing.
    pub fn register_without_api(&self, path: impl Into<PathBuf>) {
        self.registry.borrow_mut().insert(path.into(), None);
    }

    pub fn unregister(&self, path: &Path) {
        self.registry.borrow_mut().remove(path);
    }
}

impl ModuleLoader for StaticLoader {
    type Module = StaticModule;

    fn open(&mut self, path: &Path, _generation: u64) -> Result<StaticModule, ModuleError> {
        let registry = self.registry.borrow();
        let get_api = registry
            .get(path)
            .copied()
            .ok_or_else(|| ModuleError::ModuleLoadFailed {
                path: path.to_path_buf(),
                reason: "no module registered at this path".into(),
            })?;
        Ok(StaticModule {
            path: path.to_path_buf(),
            get_api,
        })
    }

    /// Files at registered paths are tracked like real modules; paths with
    /// no file behind them never go stale.
    fn identity(&self, path: &Path) -> Result<ModuleIdentity, ModuleError> {
        if path.exists() {
            ModuleIdentity::read(path)
        } else {
            Ok(ModuleIdentity::UNTRACKED)
        }
    }
}

impl std::fmt::Debug for StaticLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticLoader")
            .field("modules", &self.registry.borrow().len())
            .finish()
    }
}

#[derive(Debug)]
pub struct StaticModule {
    path: PathBuf,
    get_api: Option<GetApiFn>,
}

impl LoadedModule for StaticModule {
    fn get_api(&self) -> Option<GetApiFn> {
        self.get_api
    }

    fn loaded_path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::AppApi;

    extern "C" fn empty_api() -> AppApi {
        AppApi::empty()
    }

    #[test]
    fn test_shadow_path_is_unique_per_generation() {
        let loader = DylibLoader::with_shadow_copies(Some(PathBuf::from("/tmp/kiln")));
        let a = loader.shadow_path(Path::new("target/debug/libkiln_demo.so"), 1);
        let b = loader.shadow_path(Path::new("target/debug/libkiln_demo.so"), 2);

        assert_ne!(a, b);
        assert_eq!(a.parent(), Some(Path::new("/tmp/kiln")));
        assert_eq!(a.extension().and_then(|e| e.to_str()), Some("so"));
        let name = a.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("libkiln_demo-"));
    }

    #[test]
    fn test_dylib_open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut loader = DylibLoader::new();
        let err = loader.open(&dir.path().join("missing.so"), 1).unwrap_err();
        assert!(matches!(err, ModuleError::ModuleLoadFailed { .. }));
    }

    #[test]
    fn test_dylib_open_garbage_cleans_shadow_copy() {
        let dir = tempfile::tempdir().unwrap();
        let shadow_dir = dir.path().join("shadow");
        std::fs::create_dir(&shadow_dir).unwrap();
        let module = dir.path().join("garbage.so");
        std::fs::write(&module, b"definitely not a shared object").unwrap();

        let mut loader = DylibLoader::with_shadow_copies(Some(shadow_dir.clone()));
        let err = loader.open(&module, 3).unwrap_err();

        assert!(matches!(err, ModuleError::ModuleLoadFailed { .. }));
        assert_eq!(std::fs::read_dir(&shadow_dir).unwrap().count(), 0);
    }

    #[test]
    fn test_static_loader_serves_registered_factory() {
        let mut loader = StaticLoader::new();
        loader.register("app", empty_api);

        let module = loader.open(Path::new("app"), 1).unwrap();
        assert!(module.get_api().is_some());
        assert_eq!(module.loaded_path(), Path::new("app"));
        assert_eq!(
            loader.identity(Path::new("app")).unwrap(),
            ModuleIdentity::UNTRACKED
        );

        loader.unregister(Path::new("app"));
        assert!(loader.open(Path::new("app"), 2).is_err());
    }

    #[test]
    fn test_static_loader_without_api() {
        let mut loader = StaticLoader::new();
        loader.register_without_api("broken");
        let module = loader.open(Path::new("broken"), 1).unwrap();
        assert!(module.get_api().is_none());
    }
}
