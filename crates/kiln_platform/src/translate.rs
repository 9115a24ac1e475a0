//! winit events to host input events

use glam::{IVec2, Vec2};
use kiln_services::{InputEvent, Key, MouseButton};
use winit::event::{DeviceEvent, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Pixels per scroll "line" for touchpads reporting pixel deltas.
const PIXELS_PER_LINE: f32 = 20.0;

/// Window events that have a host equivalent. Fullscreen has no winit event;
/// the event loop polls for it after resizes.
pub fn translate_window_event(event: &WindowEvent) -> Option<InputEvent> {
    Some(match event {
        WindowEvent::KeyboardInput { event, .. } => {
            let PhysicalKey::Code(code) = event.physical_key else {
                return None;
            };
            InputEvent::Key {
                key: map_key(code)?,
                down: event.state.is_pressed(),
            }
        }
        WindowEvent::CursorMoved { position, .. } => InputEvent::MouseMoved {
            position: Vec2::new(position.x as f32, position.y as f32),
        },
        WindowEvent::CursorEntered { .. } => InputEvent::CursorEntered(true),
        WindowEvent::CursorLeft { .. } => InputEvent::CursorEntered(false),
        WindowEvent::MouseInput { state, button, .. } => InputEvent::MouseButton {
            button: map_mouse_button(*button)?,
            down: state.is_pressed(),
        },
        WindowEvent::MouseWheel { delta, .. } => InputEvent::Scroll {
            delta: match *delta {
                MouseScrollDelta::LineDelta(x, y) => Vec2::new(x, y),
                MouseScrollDelta::PixelDelta(p) => {
                    Vec2::new(p.x as f32, p.y as f32) / PIXELS_PER_LINE
                }
            },
        },
        WindowEvent::Resized(size) => InputEvent::Resized {
            size: IVec2::new(size.width as i32, size.height as i32),
        },
        WindowEvent::Focused(focused) => InputEvent::Focused(*focused),
        WindowEvent::Occluded(occluded) => InputEvent::Minimized(*occluded),
        WindowEvent::CloseRequested => InputEvent::QuitRequested,
        _ => return None,
    })
}

/// Raw mouse motion, used while the cursor is locked.
pub fn translate_device_event(event: &DeviceEvent) -> Option<InputEvent> {
    match event {
        DeviceEvent::MouseMotion { delta: (dx, dy) } => Some(InputEvent::MouseMotion {
            delta: Vec2::new(*dx as f32, *dy as f32),
        }),
        _ => None,
    }
}

pub fn map_mouse_button(button: winit::event::MouseButton) -> Option<MouseButton> {
    use winit::event::MouseButton as W;
    Some(match button {
        W::Left => MouseButton::Left,
        W::Right => MouseButton::Right,
        W::Middle => MouseButton::Middle,
        W::Back => MouseButton::Back,
        W::Forward => MouseButton::Forward,
        W::Other(_) => return None,
    })
}

pub fn map_key(code: KeyCode) -> Option<Key> {
    Some(match code {
        KeyCode::KeyA => Key::A,
        KeyCode::KeyB => Key::B,
        KeyCode::KeyC => Key::C,
        KeyCode::KeyD => Key::D,
        KeyCode::KeyE => Key::E,
        KeyCode::KeyF => Key::F,
        KeyCode::KeyG => Key::G,
        KeyCode::KeyH => Key::H,
        KeyCode::KeyI => Key::I,
        KeyCode::KeyJ => Key::J,
        KeyCode::KeyK => Key::K,
        KeyCode::KeyL => Key::L,
        KeyCode::KeyM => Key::M,
        KeyCode::KeyN => Key::N,
        KeyCode::KeyO => Key::O,
        KeyCode::KeyP => Key::P,
        KeyCode::KeyQ => Key::Q,
        KeyCode::KeyR => Key::R,
        KeyCode::KeyS => Key::S,
        KeyCode::KeyT => Key::T,
        KeyCode::KeyU => Key::U,
        KeyCode::KeyV => Key::V,
        KeyCode::KeyW => Key::W,
        KeyCode::KeyX => Key::X,
        KeyCode::KeyY => Key::Y,
        KeyCode::KeyZ => Key::Z,
        KeyCode::Digit0 => Key::Digit0,
        KeyCode::Digit1 => Key::Digit1,
        KeyCode::Digit2 => Key::Digit2,
        KeyCode::Digit3 => Key::Digit3,
        KeyCode::Digit4 => Key::Digit4,
        KeyCode::Digit5 => Key::Digit5,
        KeyCode::Digit6 => Key::Digit6,
        KeyCode::Digit7 => Key::Digit7,
        KeyCode::Digit8 => Key::Digit8,
        KeyCode::Digit9 => Key::Digit9,
        KeyCode::F1 => Key::F1,
        KeyCode::F2 => Key::F2,
        KeyCode::F3 => Key::F3,
        KeyCode::F4 => Key::F4,
        KeyCode::F5 => Key::F5,
        KeyCode::F6 => Key::F6,
        KeyCode::F7 => Key::F7,
        KeyCode::F8 => Key::F8,
        KeyCode::F9 => Key::F9,
        KeyCode::F10 => Key::F10,
        KeyCode::F11 => Key::F11,
        KeyCode::F12 => Key::F12,
        KeyCode::Escape => Key::Escape,
        KeyCode::Enter => Key::Enter,
        KeyCode::Space => Key::Space,
        KeyCode::Tab => Key::Tab,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Delete => Key::Delete,
        KeyCode::Insert => Key::Insert,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        KeyCode::PageUp => Key::PageUp,
        KeyCode::PageDown => Key::PageDown,
        KeyCode::ArrowLeft => Key::Left,
        KeyCode::ArrowRight => Key::Right,
        KeyCode::ArrowUp => Key::Up,
        KeyCode::ArrowDown => Key::Down,
        KeyCode::ShiftLeft => Key::ShiftLeft,
        KeyCode::ShiftRight => Key::ShiftRight,
        KeyCode::ControlLeft => Key::ControlLeft,
        KeyCode::ControlRight => Key::ControlRight,
        KeyCode::AltLeft => Key::AltLeft,
        KeyCode::AltRight => Key::AltRight,
        KeyCode::SuperLeft => Key::SuperLeft,
        KeyCode::SuperRight => Key::SuperRight,
        KeyCode::Minus => Key::Minus,
        KeyCode::Equal => Key::Equal,
        KeyCode::BracketLeft => Key::BracketLeft,
        KeyCode::BracketRight => Key::BracketRight,
        KeyCode::Backslash => Key::Backslash,
        KeyCode::Semicolon => Key::Semicolon,
        KeyCode::Quote => Key::Quote,
        KeyCode::Backquote => Key::Backquote,
        KeyCode::Comma => Key::Comma,
        KeyCode::Period => Key::Period,
        KeyCode::Slash => Key::Slash,
        KeyCode::CapsLock => Key::CapsLock,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::PhysicalSize;

    #[test]
    fn test_window_events_map_to_input() {
        assert_eq!(
            translate_window_event(&WindowEvent::Resized(PhysicalSize::new(800, 600))),
            Some(InputEvent::Resized {
                size: IVec2::new(800, 600)
            })
        );
        assert_eq!(
            translate_window_event(&WindowEvent::Focused(false)),
            Some(InputEvent::Focused(false))
        );
        assert_eq!(
            translate_window_event(&WindowEvent::CloseRequested),
            Some(InputEvent::QuitRequested)
        );
        assert_eq!(translate_window_event(&WindowEvent::Destroyed), None);
    }

    #[test]
    fn test_raw_motion() {
        assert_eq!(
            translate_device_event(&DeviceEvent::MouseMotion { delta: (3.0, -2.0) }),
            Some(InputEvent::MouseMotion {
                delta: Vec2::new(3.0, -2.0)
            })
        );
    }

    #[test]
    fn test_key_and_button_maps() {
        assert_eq!(map_key(KeyCode::KeyW), Some(Key::W));
        assert_eq!(map_key(KeyCode::ArrowUp), Some(Key::Up));
        assert_eq!(map_key(KeyCode::NumLock), None);
        assert_eq!(
            map_mouse_button(winit::event::MouseButton::Back),
            Some(MouseButton::Back)
        );
        assert_eq!(map_mouse_button(winit::event::MouseButton::Other(9)), None);
    }
}
