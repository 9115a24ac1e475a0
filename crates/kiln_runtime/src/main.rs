//! Kiln Runtime
//!
//! Opens a window and hosts the application module named in the settings
//! file (first argument, `kiln.json` by default), reloading it whenever the
//! library on disk changes.

mod windowed;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use kiln_runtime::HostSummary;
use kiln_services::HostConfig;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Kiln v{}", kiln_core::VERSION);

    let settings = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("kiln.json"));
    let mut config = HostConfig::load(&settings)
        .with_context(|| format!("failed to load settings from {}", settings.display()))?;
    config.module_path = resolve_module_path(&config.module_path);

    let summary = run(config)?;
    tracing::info!(
        frames = summary.counters.frames,
        reloads = summary.counters.reloads,
        failed_reloads = summary.counters.failed_reloads,
        "Kiln exited cleanly"
    );
    Ok(())
}

/// Relative module paths that do not exist from the working directory are
/// looked up next to the executable, where cargo puts the demo library.
fn resolve_module_path(path: &Path) -> PathBuf {
    if path.is_absolute() || path.exists() {
        return path.to_path_buf();
    }
    let beside_exe = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(path)));
    match beside_exe {
        Some(candidate) if candidate.exists() => candidate,
        _ => path.to_path_buf(),
    }
}

#[cfg(not(feature = "single-unit"))]
fn run(config: HostConfig) -> Result<HostSummary> {
    let loader = if config.shadow_copy {
        kiln_module::DylibLoader::with_shadow_copies(config.shadow_dir.clone())
    } else {
        kiln_module::DylibLoader::new()
    };
    windowed::run(config, loader)
}

/// The demo is linked in; nothing is loaded from disk and nothing reloads.
#[cfg(feature = "single-unit")]
fn run(config: HostConfig) -> Result<HostSummary> {
    let loader = kiln_module::StaticLoader::new();
    loader.register(&config.module_path, kiln_demo::kiln_get_app_api);
    windowed::run(config, loader)
}
