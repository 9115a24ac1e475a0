//! winit driver for the host
//!
//! The window (and with it the host) is created in `resumed`. Each
//! `RedrawRequested` runs one host frame; `about_to_wait` paces redraws to
//! the frame clock.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use glam::IVec2;
use kiln_core::FrameClock;
use kiln_module::ModuleLoader;
use kiln_platform::{translate_device_event, translate_window_event, window_attributes, WinitPlatform};
use kiln_runtime::{FrameOutcome, Host, HostSummary};
use kiln_services::{HostConfig, InputEvent};
use winit::application::ApplicationHandler;
use winit::event::{DeviceEvent, DeviceId, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

struct WindowedApp<L: ModuleLoader> {
    config: HostConfig,
    loader: Option<L>,
    host: Option<Host<L, WinitPlatform>>,
    window: Option<Arc<Window>>,
    clock: FrameClock,
    fullscreen: bool,
    error: Option<anyhow::Error>,
    summary: Option<HostSummary>,
}

impl<L: ModuleLoader> WindowedApp<L> {
    fn new(config: HostConfig, loader: L) -> Self {
        Self {
            config,
            loader: Some(loader),
            host: None,
            window: None,
            clock: FrameClock::new(),
            fullscreen: false,
            error: None,
            summary: None,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let loader = self
            .loader
            .take()
            .ok_or_else(|| anyhow!("host already started once"))?;
        let window = Arc::new(
            event_loop
                .create_window(window_attributes(&self.config.window))
                .context("failed to create window")?,
        );
        let mut host = Host::start(
            self.config.clone(),
            loader,
            WinitPlatform::new(window.clone()),
        )
        .context("failed to start host")?;

        // Seed the first frame with the real window state.
        let size = window.inner_size();
        self.fullscreen = window.fullscreen().is_some();
        host.record_event(&InputEvent::Resized {
            size: IVec2::new(size.width as i32, size.height as i32),
        });
        host.record_event(&InputEvent::Focused(window.has_focus()));
        host.record_event(&InputEvent::Fullscreen(self.fullscreen));

        window.request_redraw();
        self.clock = FrameClock::new();
        self.window = Some(window);
        self.host = Some(host);
        Ok(())
    }

    fn finish(&mut self) {
        if let Some(host) = self.host.take() {
            self.summary = Some(host.shutdown());
        }
    }
}

impl<L: ModuleLoader> ApplicationHandler for WindowedApp<L> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.host.is_some() || self.error.is_some() {
            return;
        }
        if let Err(err) = self.start(event_loop) {
            tracing::error!("{err:#}");
            self.error = Some(err);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let Some(host) = self.host.as_mut() else {
            return;
        };

        if let WindowEvent::RedrawRequested = event {
            let delta = self.clock.tick();
            if host.run_frame(delta) == FrameOutcome::Stopped {
                event_loop.exit();
            }
            return;
        }

        if let Some(input) = translate_window_event(&event) {
            host.record_event(&input);
        }
        // winit has no fullscreen event; a resize is the only hint.
        if let (WindowEvent::Resized(_), Some(window)) = (&event, &self.window) {
            let fullscreen = window.fullscreen().is_some();
            if fullscreen != self.fullscreen {
                self.fullscreen = fullscreen;
                host.record_event(&InputEvent::Fullscreen(fullscreen));
            }
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        if let (Some(host), Some(input)) = (self.host.as_mut(), translate_device_event(&event)) {
            host.record_event(&input);
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(window) = &self.window else {
            return;
        };
        let deadline = self.clock.next_deadline();
        if Instant::now() >= deadline {
            window.request_redraw();
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(deadline));
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.finish();
    }
}

/// Open the window and run until the module or the user stops.
pub fn run<L: ModuleLoader>(config: HostConfig, loader: L) -> Result<HostSummary> {
    let event_loop = EventLoop::new().context("failed to create event loop")?;
    let mut app = WindowedApp::new(config, loader);
    event_loop.run_app(&mut app)?;

    app.finish();
    if let Some(err) = app.error.take() {
        return Err(err);
    }
    app.summary
        .ok_or_else(|| anyhow!("event loop ended before the host started"))
}
