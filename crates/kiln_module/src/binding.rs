//! Module binding
//!
//! A [`ModuleBinding`] owns an opened module together with the validated
//! function table resolved from it and the identity token captured at bind
//! time. A binding only exists if every required entry point was present.

use std::path::{Path, PathBuf};

use crate::abi::{
    InitFn, ReloadedFn, ShutdownFn, UpdateFn, ABI_VERSION, GET_API_NAME, LAYOUT_FINGERPRINT,
};
use crate::error::ModuleError;
use crate::identity::ModuleIdentity;
use crate::loader::{LoadedModule, ModuleLoader};

/// A validated function table. Required entries are not optional here.
#[derive(Debug, Clone, Copy)]
pub struct BoundApi {
    pub init: InitFn,
    pub update: UpdateFn,
    pub shutdown: Option<ShutdownFn>,
    pub reloaded: Option<ReloadedFn>,
}

pub struct ModuleBinding<M: LoadedModule> {
    api: BoundApi,
    identity: ModuleIdentity,
    path: PathBuf,
    generation: u64,
    // Dropped last: the table above points into this module's code.
    module: M,
}

impl<M: LoadedModule> ModuleBinding<M> {
    /// Open `path` and resolve the full table from it.
    pub fn bind<L>(loader: &mut L, path: &Path, generation: u64) -> Result<Self, ModuleError>
    where
        L: ModuleLoader<Module = M>,
    {
        // Read the token before opening: a rebuild that lands in between
        // shows up as stale on the next poll instead of being missed.
        // A module that cannot even be stat'ed cannot be loaded either.
        let identity = loader.identity(path).map_err(|err| match err {
            ModuleError::Identity { path, source } => ModuleError::ModuleLoadFailed {
                path,
                reason: source.to_string(),
            },
            other => other,
        })?;
        let module = loader.open(path, generation)?;

        let get_api = module
            .get_api()
            .ok_or_else(|| ModuleError::MissingEntryPoint(GET_API_NAME.into()))?;
        // SAFETY: resolved from the module under the agreed signature; the
        // module stays loaded for the lifetime of this binding.
        let table = unsafe { get_api() };

        if table.abi_version != ABI_VERSION {
            return Err(ModuleError::AbiMismatch {
                field: "abi_version",
                expected: ABI_VERSION.into(),
                found: table.abi_version.into(),
            });
        }
        if table.layout != LAYOUT_FINGERPRINT {
            return Err(ModuleError::AbiMismatch {
                field: "layout",
                expected: LAYOUT_FINGERPRINT,
                found: table.layout,
            });
        }
        let init = table
            .init
            .ok_or_else(|| ModuleError::MissingEntryPoint("init".into()))?;
        let update = table
            .update
            .ok_or_else(|| ModuleError::MissingEntryPoint("update".into()))?;

        tracing::info!(
            path = %path.display(),
            loaded_from = %module.loaded_path().display(),
            generation,
            "module bound"
        );

        Ok(Self {
            api: BoundApi {
                init,
                update,
                shutdown: table.shutdown,
                reloaded: table.reloaded,
            },
            identity,
            path: path.to_path_buf(),
            generation,
            module,
        })
    }

    /// Whether the module file changed since it was bound.
    ///
    /// A file that cannot be read right now (typically mid-rebuild) is not
    /// reported as stale; the next poll will see the finished file.
    pub fn is_stale<L>(&self, loader: &L) -> bool
    where
        L: ModuleLoader<Module = M>,
    {
        match loader.identity(&self.path) {
            Ok(current) => current != self.identity,
            Err(err) => {
                tracing::debug!(%err, "module identity unavailable");
                false
            }
        }
    }

    /// Bind the same path again. The current module is released only after
    /// the new one validated; on error `self` is left untouched.
    pub fn rebind<L>(&mut self, loader: &mut L) -> Result<(), ModuleError>
    where
        L: ModuleLoader<Module = M>,
    {
        self.rebind_as(loader, self.generation + 1)
    }

    pub fn rebind_as<L>(&mut self, loader: &mut L, generation: u64) -> Result<(), ModuleError>
    where
        L: ModuleLoader<Module = M>,
    {
        let next = Self::bind(loader, &self.path.clone(), generation)?;
        let previous = std::mem::replace(self, next);
        tracing::debug!(
            from = previous.generation,
            to = self.generation,
            "previous module released"
        );
        drop(previous);
        Ok(())
    }

    #[inline]
    pub fn api(&self) -> &BoundApi {
        &self.api
    }

    #[inline]
    pub fn identity(&self) -> ModuleIdentity {
        self.identity
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn module(&self) -> &M {
        &self.module
    }
}

impl<M: LoadedModule> std::fmt::Debug for ModuleBinding<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleBinding")
            .field("path", &self.path)
            .field("generation", &self.generation)
            .field("identity", &self.identity)
            .finish()
    }
}
