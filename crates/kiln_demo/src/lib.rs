//! Kiln Demo
//!
//! A small reloadable application: a quad bouncing around the window,
//! steerable with the arrow keys. Edit, rebuild the library, and the running
//! host picks up the new build without losing the quad's position.
//!
//! Keys: arrows steer, `L` toggles mouse lock, `F1` cycles the cursor,
//! `Escape` quits.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use kiln_module::{App, AppHost, IconImage, LogLevel, UpdateSignal};
use kiln_services::{AppInput, CursorKind, Key};

/// Draw tag for [`QuadVertex`] lists.
pub const DRAW_QUADS: u32 = 1;

const QUAD_HALF_SIZE: f32 = 24.0;
const STEER_ACCEL: f32 = 900.0;
const START_VELOCITY: Vec2 = Vec2::new(220.0, 160.0);
const STATUS_EVERY: u64 = 300;
const ICON_SIZE: usize = 16;

const CURSORS: [CursorKind; 4] = [
    CursorKind::Default,
    CursorKind::Crosshair,
    CursorKind::Pointer,
    CursorKind::Hidden,
];

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub color: [f32; 3],
    pub _pad: f32,
}

/// Lives in the host's persistent arena across reloads.
#[derive(Debug)]
pub struct DemoState {
    pub frames: u64,
    pub reloads: u32,
    pub position: Vec2,
    pub velocity: Vec2,
    pub bounds: Vec2,
    pub cursor: u32,
    pub mouse_locked: bool,
}

impl DemoState {
    fn new(bounds: Vec2) -> Self {
        Self {
            frames: 0,
            reloads: 0,
            position: bounds * 0.5,
            velocity: START_VELOCITY,
            bounds,
            cursor: 0,
            mouse_locked: false,
        }
    }

    /// Integrate one step and bounce off the window edges.
    pub fn step(&mut self, dt: f32, steer: Vec2) {
        self.velocity += steer * STEER_ACCEL * dt;
        self.position += self.velocity * dt;

        let min = Vec2::splat(QUAD_HALF_SIZE);
        let max = (self.bounds - min).max(min);
        for axis in 0..2 {
            if self.position[axis] < min[axis] {
                self.position[axis] = min[axis];
                self.velocity[axis] = self.velocity[axis].abs();
            } else if self.position[axis] > max[axis] {
                self.position[axis] = max[axis];
                self.velocity[axis] = -self.velocity[axis].abs();
            }
        }
    }

    /// Two triangles in clip space.
    pub fn quad(&self, out: &mut [QuadVertex; 6]) {
        let to_clip = |p: Vec2| {
            let ndc = p / self.bounds.max(Vec2::ONE) * 2.0 - Vec2::ONE;
            [ndc.x, -ndc.y]
        };
        let h = QUAD_HALF_SIZE;
        let corners = [
            self.position + Vec2::new(-h, -h),
            self.position + Vec2::new(h, -h),
            self.position + Vec2::new(h, h),
            self.position + Vec2::new(-h, h),
        ];
        let tint = (self.frames % 120) as f32 / 120.0;
        let color = [1.0, tint, 0.25];
        for (vertex, corner) in out.iter_mut().zip([0, 1, 2, 0, 2, 3]) {
            *vertex = QuadVertex {
                position: to_clip(corners[corner]),
                color,
                _pad: 0.0,
            };
        }
    }
}

/// A quad on a transparent background, tinted top to bottom.
fn icon_pixels() -> [u8; ICON_SIZE * ICON_SIZE * 4] {
    let mut pixels = [0u8; ICON_SIZE * ICON_SIZE * 4];
    for (i, pixel) in pixels.chunks_exact_mut(4).enumerate() {
        let (x, y) = (i % ICON_SIZE, i / ICON_SIZE);
        if (3..ICON_SIZE - 3).contains(&x) && (3..ICON_SIZE - 3).contains(&y) {
            let tint = (y * 255 / ICON_SIZE) as u8;
            pixel.copy_from_slice(&[255, tint, 64, 255]);
        }
    }
    pixels
}

fn steering(input: &AppInput) -> Vec2 {
    let axis = |neg: Key, pos: Key| {
        let keys = &input.keyboard;
        f32::from(u8::from(keys.is_down(pos))) - f32::from(u8::from(keys.is_down(neg)))
    };
    Vec2::new(axis(Key::Left, Key::Right), axis(Key::Up, Key::Down))
}

impl App for DemoState {
    fn init(host: &AppHost<'_>) -> Self {
        let surface = host.surface();
        host.set_window_title("kiln demo");
        let pixels = icon_pixels();
        host.set_window_icon(&[IconImage {
            width: ICON_SIZE as u32,
            height: ICON_SIZE as u32,
            pixels: pixels.as_ptr(),
        }]);
        host.log(
            LogLevel::Info,
            &format!("demo starting on a {}x{} surface", surface.width, surface.height),
        );
        DemoState::new(Vec2::new(surface.width as f32, surface.height as f32))
    }

    fn update(&mut self, host: &AppHost<'_>, input: &AppInput) -> UpdateSignal {
        let keys = &input.keyboard;
        if keys.pressed(Key::Escape) {
            return UpdateSignal::Stop;
        }
        if keys.pressed(Key::L) {
            self.mouse_locked = !self.mouse_locked;
            host.set_mouse_locked(self.mouse_locked);
        }
        if keys.pressed(Key::F1) {
            self.cursor = (self.cursor + 1) % CURSORS.len() as u32;
            host.set_cursor(CURSORS[self.cursor as usize]);
        }
        if input.screen_size_changed && input.screen_size.min_element() > 0 {
            self.bounds = input.screen_size.as_vec2();
        }

        if !input.is_minimized {
            self.step(input.frame_delta_ms / 1000.0, steering(input));
        }
        self.frames += 1;

        if let Some(scratch) = host.frame_scratch() {
            if let Ok(vertices) = scratch.alloc_slice_zeroed::<QuadVertex>(6) {
                if let Ok(quad) = <&mut [QuadVertex; 6]>::try_from(&mut *vertices) {
                    self.quad(quad);
                }
                host.submit_draw(DRAW_QUADS, bytemuck::cast_slice(&*vertices));
            }
            if self.frames % STATUS_EVERY == 0 {
                if let Ok(line) = scratch.format(format_args!(
                    "frame {} at ({:.0}, {:.0})",
                    self.frames, self.position.x, self.position.y
                )) {
                    host.log(LogLevel::Debug, line);
                }
            }
        }
        UpdateSignal::Continue
    }

    fn reloaded(&mut self, host: &AppHost<'_>) {
        self.reloads += 1;
        host.log(
            LogLevel::Info,
            &format!("demo reloaded ({} so far, frame {})", self.reloads, self.frames),
        );
    }

    fn shutdown(&mut self, host: &AppHost<'_>) {
        host.log(
            LogLevel::Info,
            &format!("demo shutting down after {} frames", self.frames),
        );
    }
}

kiln_module::export_app!(DemoState);
