//! Reload host loop
//!
//! [`Host`] owns the persistent arena, the scratch pool, the input buffer
//! and the current module binding, and sequences every frame:
//! events → `advance_frame` → frame scratch → module update → scratch release.
//! Reload checks happen strictly between frames.

use std::ffi::c_void;
use std::time::{Duration, Instant};

use kiln_core::{contract, Arena, ArenaError, ArenaFlags, Scratch, ScratchStack};
use kiln_metrics::{FrameStats, FrameSummary};
use kiln_module::{
    HostCapabilities, HostInfo, ModuleBinding, ModuleError, ModuleIdentity, ModuleLoader,
    UpdateSignal,
};
use kiln_platform::Platform;
use kiln_services::{AppInput, HostConfig, InputBuffer, InputEvent, SettingsError};
use thiserror::Error;

use crate::capabilities::CapabilityBridge;

/// Frames kept in the rolling statistics window.
const STATS_WINDOW: usize = 240;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("persistent memory: {0}")]
    Arena(#[from] ArenaError),

    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error("module initialize returned no application state")]
    InitFailed,

    #[error("invalid application state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    Starting,
    Running,
    ReloadPending,
    Stopping,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Continue,
    Stopped,
}

#[derive(Debug)]
pub enum ReloadOutcome {
    /// Not stale, or not time to poll yet.
    Unchanged,
    Reloaded { generation: u64 },
    /// The new build was rejected; the previous one keeps running.
    Failed(ModuleError),
    /// The file still holds a build that already failed.
    Suppressed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostCounters {
    pub frames: u64,
    pub reloads: u64,
    pub failed_reloads: u64,
}

/// What a finished host reports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostSummary {
    pub counters: HostCounters,
    pub generation: u64,
    pub timing: FrameSummary,
}

pub struct Host<L: ModuleLoader, P: Platform> {
    config: HostConfig,
    loader: L,
    binding: Option<ModuleBinding<L::Module>>,
    /// Last load attempt; every attempt gets a fresh number.
    generation: u64,
    app_state: *mut c_void,
    input: InputBuffer,
    scratch: Box<ScratchStack>,
    persistent: Box<Arena>,
    bridge: Box<CapabilityBridge<P>>,
    state: HostState,
    quit_requested: bool,
    since_poll: Duration,
    failed_identity: Option<ModuleIdentity>,
    counters: HostCounters,
    stats: FrameStats,
}

impl<L: ModuleLoader, P: Platform> Host<L, P> {
    /// Create the memory, bind the module and run its initialize entry point.
    /// Any error here is fatal.
    pub fn start(config: HostConfig, mut loader: L, platform: P) -> Result<Self, HostError> {
        config.validate()?;
        tracing::info!(module = %config.module_path.display(), "host starting");

        let flags = ArenaFlags {
            growable: config.persistent_arena_growable,
            ..ArenaFlags::default()
        };
        let persistent = Box::new(Arena::create(config.persistent_arena_capacity, flags)?);
        let scratch = Box::new(ScratchStack::new(
            config.scratch_slot_count,
            config.scratch_slot_capacity,
        )?);
        let binding = ModuleBinding::bind(&mut loader, &config.module_path, 1)?;

        let mut host = Self {
            config,
            loader,
            binding: Some(binding),
            generation: 1,
            app_state: std::ptr::null_mut(),
            input: InputBuffer::new(),
            scratch,
            persistent,
            bridge: CapabilityBridge::new(platform),
            state: HostState::Starting,
            quit_requested: false,
            since_poll: Duration::ZERO,
            failed_identity: None,
            counters: HostCounters::default(),
            stats: FrameStats::new(STATS_WINDOW),
        };
        host.init_app()?;
        host.state = HostState::Running;
        tracing::info!(persistent_used = host.persistent.used(), "host running");
        Ok(host)
    }

    fn init_app(&mut self) -> Result<(), HostError> {
        let init = self
            .binding
            .as_ref()
            .map(|binding| binding.api().init)
            .ok_or_else(|| HostError::InvalidState("no module bound".into()))?;

        // SAFETY: `init` comes from the validated binding; both context
        // structs outlive the call.
        let state = self.invoke(|info, caps| unsafe { init(info, caps) });

        if state.is_null() {
            return Err(HostError::InitFailed);
        }
        if !self.persistent.contains(state as *const u8) {
            return Err(HostError::InvalidState(format!(
                "{state:p} is not inside the persistent arena"
            )));
        }
        self.app_state = state;
        Ok(())
    }

    /// Forward one platform event. A quit request takes effect at the next frame.
    pub fn record_event(&mut self, event: &InputEvent) {
        if let InputEvent::QuitRequested = event {
            tracing::info!("quit requested by platform");
            self.quit_requested = true;
        }
        self.input.record_event(event);
    }

    pub fn request_quit(&mut self) {
        self.quit_requested = true;
    }

    /// Run one frame. `delta` is the wall time since the previous frame.
    pub fn run_frame(&mut self, delta: Duration) -> FrameOutcome {
        if self.state != HostState::Running {
            return FrameOutcome::Stopped;
        }
        if self.quit_requested {
            self.stop();
            return FrameOutcome::Stopped;
        }

        // Reload outcomes are logged where they happen.
        let _ = self.poll_reload(delta);

        let Some(update) = self.binding.as_ref().map(|b| b.api().update) else {
            self.stop();
            return FrameOutcome::Stopped;
        };
        let input: *const AppInput = self.input.advance_frame(delta);
        let state = self.app_state;

        let started = Instant::now();
        // SAFETY: `update` comes from the current binding; `input` points
        // into the input buffer, which is not touched until the call returns.
        let signal = self.invoke(|info, caps| unsafe { update(info, caps, state, input) });
        let spent = started.elapsed();

        self.counters.frames += 1;
        self.stats.record_frame(delta, spent);

        match signal {
            UpdateSignal::Continue => FrameOutcome::Continue,
            UpdateSignal::Stop => {
                tracing::info!(frame = self.counters.frames, "module requested stop");
                self.stop();
                FrameOutcome::Stopped
            }
        }
    }

    /// Poll for a new build once the configured interval has elapsed.
    pub fn poll_reload(&mut self, delta: Duration) -> ReloadOutcome {
        self.since_poll += delta;
        if self.since_poll < self.config.reload_poll_interval() {
            return ReloadOutcome::Unchanged;
        }
        self.since_poll = Duration::ZERO;
        self.check_reload()
    }

    /// Check for a new build now and rebind if there is one.
    pub fn check_reload(&mut self) -> ReloadOutcome {
        if self.state != HostState::Running {
            return ReloadOutcome::Unchanged;
        }
        let Some(binding) = self.binding.as_mut() else {
            return ReloadOutcome::Unchanged;
        };
        if !binding.is_stale(&self.loader) {
            return ReloadOutcome::Unchanged;
        }

        let identity = self.loader.identity(binding.path()).ok();
        if identity.is_some() && identity == self.failed_identity {
            return ReloadOutcome::Suppressed;
        }

        self.state = HostState::ReloadPending;
        self.generation += 1;
        let result = binding.rebind_as(&mut self.loader, self.generation);
        self.state = HostState::Running;

        match result {
            Ok(()) => {
                self.failed_identity = None;
                self.counters.reloads += 1;
                tracing::info!(generation = self.generation, "module reloaded");
                self.notify_reloaded();
                ReloadOutcome::Reloaded {
                    generation: self.generation,
                }
            }
            Err(err) => {
                self.failed_identity = identity;
                self.counters.failed_reloads += 1;
                tracing::warn!(
                    %err,
                    attempt = self.generation,
                    "reload failed, keeping previous module"
                );
                ReloadOutcome::Failed(err)
            }
        }
    }

    fn notify_reloaded(&mut self) {
        let Some(reloaded) = self.binding.as_ref().and_then(|b| b.api().reloaded) else {
            return;
        };
        let state = self.app_state;
        // SAFETY: as for `update`.
        self.invoke(|info, caps| unsafe { reloaded(info, caps, state) });
    }

    /// Run `call` with fresh context structs and a scratch opened around it.
    fn invoke<R>(&mut self, call: impl FnOnce(&HostInfo, &HostCapabilities) -> R) -> R {
        let frame = self.scratch.begin();
        let info = HostInfo {
            persistent: &mut *self.persistent,
            scratch: &*self.scratch,
            frame_scratch: (&frame as *const Scratch<'_>).cast(),
        };
        let caps = self.bridge.table();

        let result = call(&info, &caps);
        frame.end();

        let leaked = self.scratch.open_count();
        if leaked > 0 {
            contract::violation(format_args!(
                "{leaked} scratch handle(s) still open after a module call"
            ));
        }

        if let Some(locked) = self.bridge.flush() {
            self.input.set_mouse_locked(locked);
        }
        result
    }

    /// Run the shutdown hook, unload the module and reclaim persistent memory.
    fn stop(&mut self) {
        if matches!(self.state, HostState::Stopping | HostState::Stopped) {
            return;
        }
        self.state = HostState::Stopping;

        let shutdown = self.binding.as_ref().and_then(|b| b.api().shutdown);
        if let Some(shutdown) = shutdown {
            if !self.app_state.is_null() && !std::thread::panicking() {
                let state = self.app_state;
                // SAFETY: as for `update`.
                self.invoke(|info, caps| unsafe { shutdown(info, caps, state) });
            }
        }

        self.app_state = std::ptr::null_mut();
        self.binding = None;
        self.persistent.reset();
        self.state = HostState::Stopped;

        let timing = self.stats.summary();
        tracing::info!(
            frames = self.counters.frames,
            reloads = self.counters.reloads,
            failed_reloads = self.counters.failed_reloads,
            fps = timing.fps,
            update_avg_us = timing.update_avg.as_micros() as u64,
            "host stopped"
        );
    }

    /// Stop (if not already stopped) and release everything.
    pub fn shutdown(mut self) -> HostSummary {
        self.stop();
        self.summary()
    }

    pub fn summary(&self) -> HostSummary {
        HostSummary {
            counters: self.counters,
            generation: self.generation,
            timing: self.stats.summary(),
        }
    }

    #[inline]
    pub fn state(&self) -> HostState {
        self.state
    }

    #[inline]
    pub fn counters(&self) -> HostCounters {
        self.counters
    }

    #[inline]
    pub fn input(&self) -> &InputBuffer {
        &self.input
    }

    pub fn binding(&self) -> Option<&ModuleBinding<L::Module>> {
        self.binding.as_ref()
    }

    /// The opaque application state. Null once stopped.
    #[inline]
    pub fn app_state(&self) -> *mut c_void {
        self.app_state
    }

    pub fn persistent(&self) -> &Arena {
        &self.persistent
    }

    pub fn scratch(&self) -> &ScratchStack {
        &self.scratch
    }

    pub fn platform(&self) -> std::cell::Ref<'_, P> {
        self.bridge.platform()
    }

    pub fn platform_mut(&mut self) -> std::cell::RefMut<'_, P> {
        self.bridge.platform_mut()
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }
}

impl<L: ModuleLoader, P: Platform> Drop for Host<L, P> {
    fn drop(&mut self) {
        self.stop();
    }
}
