//! Events delivered by the platform between frames

use glam::{IVec2, Vec2};

use crate::input::{Key, MouseButton};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Key { key: Key, down: bool },
    /// Absolute cursor position in the window.
    MouseMoved { position: Vec2 },
    /// Raw device motion, independent of the cursor.
    MouseMotion { delta: Vec2 },
    MouseButton { button: MouseButton, down: bool },
    Scroll { delta: Vec2 },
    CursorEntered(bool),
    Resized { size: IVec2 },
    Focused(bool),
    Minimized(bool),
    Fullscreen(bool),
    /// The user asked to close the window. Not recorded into the snapshot.
    QuitRequested,
}
