//! Input state handed to the application module
//!
//! Everything here is `#[repr(C)]` and `Copy`: one [`AppInput`] is passed by
//! pointer across the module boundary every frame.

use glam::{IVec2, Vec2};

/// One digital input (key or mouse button).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BtnState {
    pub is_down: bool,
    /// State at the end of the previous frame.
    pub was_down: bool,
    /// Up/down changes seen this frame.
    pub transitions: u8,
}

impl BtnState {
    pub fn set(&mut self, down: bool) {
        if self.is_down != down {
            self.is_down = down;
            self.transitions = self.transitions.saturating_add(1);
        }
    }

    /// Went down at some point this frame, even if already released again.
    pub fn pressed(&self) -> bool {
        match self.transitions {
            0 => false,
            1 => self.is_down,
            _ => true,
        }
    }

    /// Went up at some point this frame, even if already pressed again.
    pub fn released(&self) -> bool {
        match self.transitions {
            0 => false,
            1 => !self.is_down,
            _ => true,
        }
    }

    /// Start a new frame.
    pub fn settle(&mut self) {
        self.was_down = self.is_down;
        self.transitions = 0;
    }
}

macro_rules! keys {
    ($($name:ident),* $(,)?) => {
        /// Physical keyboard keys.
        #[repr(u8)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Key {
            $($name),*
        }

        impl Key {
            pub const ALL: &'static [Key] = &[$(Key::$name),*];
        }
    };
}

keys! {
    A, B, C, D, E, F, G, H, I, J, K, L, M,
    N, O, P, Q, R, S, T, U, V, W, X, Y, Z,
    Digit0, Digit1, Digit2, Digit3, Digit4,
    Digit5, Digit6, Digit7, Digit8, Digit9,
    F1, F2, F3, F4, F5, F6, F7, F8, F9, F10, F11, F12,
    Escape, Enter, Space, Tab, Backspace, Delete, Insert,
    Home, End, PageUp, PageDown,
    Left, Right, Up, Down,
    ShiftLeft, ShiftRight, ControlLeft, ControlRight,
    AltLeft, AltRight, SuperLeft, SuperRight,
    Minus, Equal, BracketLeft, BracketRight, Backslash,
    Semicolon, Quote, Backquote, Comma, Period, Slash, CapsLock,
}

pub const KEY_COUNT: usize = Key::ALL.len();

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyboardState {
    pub keys: [BtnState; KEY_COUNT],
}

impl KeyboardState {
    #[inline]
    pub fn key(&self, key: Key) -> BtnState {
        self.keys[key as usize]
    }

    #[inline]
    pub fn key_mut(&mut self, key: Key) -> &mut BtnState {
        &mut self.keys[key as usize]
    }

    pub fn is_down(&self, key: Key) -> bool {
        self.key(key).is_down
    }

    pub fn pressed(&self, key: Key) -> bool {
        self.key(key).pressed()
    }

    pub fn released(&self, key: Key) -> bool {
        self.key(key).released()
    }

    pub fn settle(&mut self) {
        self.keys.iter_mut().for_each(BtnState::settle);
    }
}

impl Default for KeyboardState {
    fn default() -> Self {
        Self {
            keys: [BtnState::default(); KEY_COUNT],
        }
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Back,
    Forward,
}

pub const MOUSE_BUTTON_COUNT: usize = 5;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MouseState {
    /// Window-relative position in physical pixels.
    pub position: Vec2,
    /// Movement this frame. Raw device motion while locked.
    pub delta: Vec2,
    /// Wheel movement this frame.
    pub scroll: Vec2,
    pub buttons: [BtnState; MOUSE_BUTTON_COUNT],
    pub is_locked: bool,
    pub is_over_window: bool,
}

impl MouseState {
    #[inline]
    pub fn button(&self, button: MouseButton) -> BtnState {
        self.buttons[button as usize]
    }

    #[inline]
    pub fn button_mut(&mut self, button: MouseButton) -> &mut BtnState {
        &mut self.buttons[button as usize]
    }
}

/// Mouse cursor appearance requested by the application.
#[repr(u32)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CursorKind {
    #[default]
    Default = 0,
    Pointer,
    Text,
    Crosshair,
    Move,
    ResizeHorizontal,
    ResizeVertical,
    NotAllowed,
    Wait,
    Hidden,
}

impl CursorKind {
    pub fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => Self::Default,
            1 => Self::Pointer,
            2 => Self::Text,
            3 => Self::Crosshair,
            4 => Self::Move,
            5 => Self::ResizeHorizontal,
            6 => Self::ResizeVertical,
            7 => Self::NotAllowed,
            8 => Self::Wait,
            9 => Self::Hidden,
            _ => return None,
        })
    }
}

/// One frame of input and window state.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AppInput {
    /// Milliseconds since the host started.
    pub program_time_ms: u64,
    pub frame_delta_ms: f32,
    /// Zero on the first frame.
    pub frame_index: u64,

    pub keyboard: KeyboardState,
    pub mouse: MouseState,
    pub cursor: CursorKind,

    pub is_fullscreen: bool,
    pub is_fullscreen_changed: bool,
    pub is_minimized: bool,
    pub is_minimized_changed: bool,
    pub is_focused: bool,
    pub is_focused_changed: bool,
    pub screen_size: IVec2,
    pub screen_size_changed: bool,
}

impl AppInput {
    /// Set every "changed" flag from a comparison against `previous`.
    pub fn diff_against(&mut self, previous: &AppInput) {
        self.is_fullscreen_changed = self.is_fullscreen != previous.is_fullscreen;
        self.is_minimized_changed = self.is_minimized != previous.is_minimized;
        self.is_focused_changed = self.is_focused != previous.is_focused;
        self.screen_size_changed = self.screen_size != previous.screen_size;
    }

    pub fn mark_all_changed(&mut self) {
        self.is_fullscreen_changed = true;
        self.is_minimized_changed = true;
        self.is_focused_changed = true;
        self.screen_size_changed = true;
    }

    /// Drop everything that only describes a single frame.
    pub fn clear_transients(&mut self) {
        self.is_fullscreen_changed = false;
        self.is_minimized_changed = false;
        self.is_focused_changed = false;
        self.screen_size_changed = false;
        self.mouse.delta = Vec2::ZERO;
        self.mouse.scroll = Vec2::ZERO;
        self.mouse.buttons.iter_mut().for_each(BtnState::settle);
        self.keyboard.settle();
    }

    pub fn any_changed(&self) -> bool {
        self.is_fullscreen_changed
            || self.is_minimized_changed
            || self.is_focused_changed
            || self.screen_size_changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_btn_press_and_release_within_frame() {
        let mut btn = BtnState::default();
        btn.set(true);
        btn.set(false);
        assert!(btn.pressed());
        assert!(btn.released());
        assert!(!btn.is_down);

        btn.settle();
        assert!(!btn.pressed());
        assert!(!btn.was_down);
    }

    #[test]
    fn test_btn_repeat_is_not_a_transition() {
        let mut btn = BtnState::default();
        btn.set(true);
        btn.set(true);
        assert_eq!(btn.transitions, 1);
        assert!(btn.pressed());
        assert!(!btn.released());
    }

    #[test]
    fn test_cursor_kind_raw_roundtrip() {
        assert_eq!(CursorKind::from_raw(CursorKind::Text as u32), Some(CursorKind::Text));
        assert_eq!(CursorKind::from_raw(99), None);
    }

    #[test]
    fn test_key_table_covers_every_key() {
        let mut keyboard = KeyboardState::default();
        keyboard.key_mut(Key::CapsLock).set(true);
        assert!(keyboard.is_down(Key::CapsLock));
        assert_eq!(*Key::ALL.last().unwrap() as usize, KEY_COUNT - 1);
    }
}
