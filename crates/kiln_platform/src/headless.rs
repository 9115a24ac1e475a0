//! Windowless platform
//!
//! Records every request so tests (and batch runs) can inspect what the
//! application asked for.

use kiln_module::{NativeWindowHandle, PixelFormat, SurfaceDescription};
use kiln_services::CursorKind;

use crate::{Platform, WindowIcon};

#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessPlatform {
    pub width: u32,
    pub height: u32,
    pub title: String,
    pub cursor: CursorKind,
    pub mouse_locked: bool,
    pub icons: Vec<WindowIcon>,
    /// Submissions since the last `take_draws`.
    pub draws: Vec<(u32, Vec<u8>)>,
}

impl HeadlessPlatform {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            title: String::new(),
            cursor: CursorKind::Default,
            mouse_locked: false,
            icons: Vec::new(),
            draws: Vec::new(),
        }
    }

    pub fn take_draws(&mut self) -> Vec<(u32, Vec<u8>)> {
        std::mem::take(&mut self.draws)
    }
}

impl Default for HeadlessPlatform {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

impl Platform for HeadlessPlatform {
    fn surface(&self) -> SurfaceDescription {
        SurfaceDescription {
            width: self.width,
            height: self.height,
            scale_factor: 1.0,
            format: PixelFormat::Unknown,
            native: NativeWindowHandle::default(),
        }
    }

    fn native_window(&self) -> NativeWindowHandle {
        NativeWindowHandle::default()
    }

    fn set_mouse_locked(&mut self, locked: bool) -> bool {
        self.mouse_locked = locked;
        true
    }

    fn set_cursor(&mut self, cursor: CursorKind) {
        self.cursor = cursor;
    }

    fn set_window_title(&mut self, title: &str) {
        self.title = title.to_owned();
    }

    fn set_window_icon(&mut self, icons: &[WindowIcon]) {
        self.icons = icons.to_vec();
    }

    fn submit_draw(&mut self, tag: u32, bytes: &[u8]) {
        self.draws.push((tag, bytes.to_vec()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_requests() {
        let mut platform = HeadlessPlatform::new(640, 480);
        assert!(platform.set_mouse_locked(true));
        assert!(platform.mouse_locked);
        platform.set_window_title("kiln test");
        platform.submit_draw(2, &[1, 2, 3]);

        assert_eq!(platform.surface().width, 640);
        assert_eq!(platform.title, "kiln test");
        assert_eq!(platform.take_draws(), vec![(2, vec![1, 2, 3])]);
        assert!(platform.draws.is_empty());
    }
}
