//! Double-buffered input snapshot
//!
//! Two [`AppInput`] instances alternate roles. The live instance receives
//! events between frames; `advance_frame` freezes it into the stable
//! snapshot the application reads for one update call, and seeds the other
//! instance as the next live one.

use std::time::Duration;

use glam::Vec2;

use crate::event::InputEvent;
use crate::input::AppInput;

pub struct InputBuffer {
    instances: Box<[AppInput; 2]>,
    live: usize,
    frames: u64,
    elapsed: Duration,
    /// Set on unlock. The first absolute position afterwards only moves the
    /// cursor; it does not count as motion.
    resync_position: bool,
}

impl InputBuffer {
    /// Both instances start zeroed; instance 0 is live.
    pub fn new() -> Self {
        Self {
            instances: Box::new([AppInput::default(); 2]),
            live: 0,
            frames: 0,
            elapsed: Duration::ZERO,
            resync_position: false,
        }
    }

    #[inline]
    pub fn live(&self) -> &AppInput {
        &self.instances[self.live]
    }

    /// Most recently frozen snapshot. All zeroes before the first frame.
    #[inline]
    pub fn stable(&self) -> &AppInput {
        &self.instances[1 - self.live]
    }

    /// Frames advanced so far.
    #[inline]
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Apply one platform event to the live instance.
    pub fn record_event(&mut self, event: &InputEvent) {
        let live = &mut self.instances[self.live];
        match *event {
            InputEvent::Key { key, down } => live.keyboard.key_mut(key).set(down),
            InputEvent::MouseMoved { position } => {
                // Under lock the OS keeps warping the cursor; only raw motion counts.
                if !live.mouse.is_locked {
                    if !std::mem::take(&mut self.resync_position) {
                        live.mouse.delta += position - live.mouse.position;
                    }
                    live.mouse.position = position;
                }
            }
            InputEvent::MouseMotion { delta } => {
                if live.mouse.is_locked {
                    live.mouse.delta += delta;
                }
            }
            InputEvent::MouseButton { button, down } => live.mouse.button_mut(button).set(down),
            InputEvent::Scroll { delta } => live.mouse.scroll += delta,
            InputEvent::CursorEntered(inside) => live.mouse.is_over_window = inside,
            InputEvent::Resized { size } => live.screen_size = size,
            InputEvent::Focused(focused) => live.is_focused = focused,
            InputEvent::Minimized(minimized) => live.is_minimized = minimized,
            InputEvent::Fullscreen(fullscreen) => live.is_fullscreen = fullscreen,
            InputEvent::QuitRequested => {}
        }
    }

    /// Freeze the live instance into the stable snapshot and return it.
    pub fn advance_frame(&mut self, delta: Duration) -> &AppInput {
        self.elapsed += delta;

        let [first, second] = &mut *self.instances;
        let (live, previous) = if self.live == 0 {
            (first, second)
        } else {
            (second, first)
        };

        if self.frames == 0 {
            live.mark_all_changed();
        } else {
            live.diff_against(previous);
        }
        live.frame_index = self.frames;
        live.program_time_ms = self.elapsed.as_millis() as u64;
        live.frame_delta_ms = delta.as_secs_f32() * 1000.0;

        // The previous stable slot becomes the next live one.
        *previous = *live;
        previous.clear_transients();

        self.live = 1 - self.live;
        self.frames += 1;
        self.stable()
    }

    /// Lock state is written into both instances so the next diff does not
    /// see it as an input change.
    pub fn set_mouse_locked(&mut self, locked: bool) {
        if self.live().mouse.is_locked && !locked {
            self.resync_position = true;
        }
        for instance in self.instances.iter_mut() {
            instance.mouse.is_locked = locked;
            instance.mouse.delta = Vec2::ZERO;
        }
    }
}

impl Default for InputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Key, MouseButton};
    use glam::IVec2;
    use proptest::prelude::*;

    const FRAME: Duration = Duration::from_millis(16);

    #[test]
    fn test_first_frame_marks_everything_changed() {
        let mut buffer = InputBuffer::new();
        let stable = buffer.advance_frame(FRAME);
        assert_eq!(stable.frame_index, 0);
        assert!(stable.screen_size_changed);
        assert!(stable.is_focused_changed);
        assert!(stable.is_minimized_changed);
        assert!(stable.is_fullscreen_changed);
    }

    #[test]
    fn test_resize_then_quiet_frame() {
        let mut buffer = InputBuffer::new();
        buffer.advance_frame(FRAME);

        buffer.record_event(&InputEvent::Resized {
            size: IVec2::new(800, 600),
        });
        let stable = *buffer.advance_frame(FRAME);
        assert!(stable.screen_size_changed);
        assert_eq!(stable.screen_size, IVec2::new(800, 600));
        assert!(!stable.is_focused_changed);

        let stable = *buffer.advance_frame(FRAME);
        assert!(!stable.screen_size_changed);
        assert_eq!(stable.screen_size, IVec2::new(800, 600));
        assert_eq!(stable.frame_index, 2);
    }

    #[test]
    fn test_events_only_touch_live_instance() {
        let mut buffer = InputBuffer::new();
        buffer.advance_frame(FRAME);
        let before = *buffer.stable();

        buffer.record_event(&InputEvent::Key {
            key: Key::W,
            down: true,
        });
        buffer.record_event(&InputEvent::Focused(true));

        assert_eq!(*buffer.stable(), before);
        assert!(buffer.live().keyboard.is_down(Key::W));
    }

    #[test]
    fn test_transients_cleared_on_next_live() {
        let mut buffer = InputBuffer::new();
        buffer.record_event(&InputEvent::Scroll {
            delta: Vec2::new(0.0, 3.0),
        });
        buffer.record_event(&InputEvent::MouseButton {
            button: MouseButton::Left,
            down: true,
        });
        let stable = *buffer.advance_frame(FRAME);
        assert_eq!(stable.mouse.scroll, Vec2::new(0.0, 3.0));
        assert!(stable.mouse.button(MouseButton::Left).pressed());

        let live = buffer.live();
        assert_eq!(live.mouse.scroll, Vec2::ZERO);
        assert!(live.mouse.button(MouseButton::Left).is_down);
        assert!(live.mouse.button(MouseButton::Left).was_down);
        assert!(!live.mouse.button(MouseButton::Left).pressed());

        let held = buffer.advance_frame(FRAME);
        assert!(held.mouse.button(MouseButton::Left).is_down);
        assert!(!held.mouse.button(MouseButton::Left).pressed());
    }

    #[test]
    fn test_mouse_lock_uses_raw_motion() {
        let mut buffer = InputBuffer::new();
        buffer.set_mouse_locked(true);
        buffer.record_event(&InputEvent::MouseMoved {
            position: Vec2::new(50.0, 50.0),
        });
        buffer.record_event(&InputEvent::MouseMotion {
            delta: Vec2::new(2.0, -1.0),
        });

        let stable = buffer.advance_frame(FRAME);
        assert!(stable.mouse.is_locked);
        assert_eq!(stable.mouse.delta, Vec2::new(2.0, -1.0));
        assert_eq!(stable.mouse.position, Vec2::ZERO);
    }

    #[test]
    fn test_unlock_does_not_turn_cursor_jump_into_motion() {
        let mut buffer = InputBuffer::new();
        buffer.record_event(&InputEvent::MouseMoved {
            position: Vec2::new(10.0, 10.0),
        });
        buffer.advance_frame(FRAME);

        buffer.set_mouse_locked(true);
        buffer.record_event(&InputEvent::MouseMoved {
            position: Vec2::new(400.0, 300.0),
        });
        buffer.advance_frame(FRAME);

        buffer.set_mouse_locked(false);
        buffer.record_event(&InputEvent::MouseMoved {
            position: Vec2::new(400.0, 300.0),
        });
        buffer.record_event(&InputEvent::MouseMoved {
            position: Vec2::new(403.0, 296.0),
        });
        let stable = buffer.advance_frame(FRAME);
        assert!(!stable.mouse.is_locked);
        assert_eq!(stable.mouse.position, Vec2::new(403.0, 296.0));
        assert_eq!(stable.mouse.delta, Vec2::new(3.0, -4.0));
    }

    #[test]
    fn test_mouse_lock_written_to_both_instances() {
        let mut buffer = InputBuffer::new();
        buffer.advance_frame(FRAME);
        buffer.set_mouse_locked(true);
        assert!(buffer.live().mouse.is_locked);
        assert!(buffer.stable().mouse.is_locked);
    }

    #[test]
    fn test_time_accumulates() {
        let mut buffer = InputBuffer::new();
        buffer.advance_frame(Duration::from_millis(10));
        let stable = buffer.advance_frame(Duration::from_millis(15));
        assert_eq!(stable.program_time_ms, 25);
        assert!((stable.frame_delta_ms - 15.0).abs() < 1e-3);
    }

    fn window_event() -> impl Strategy<Value = InputEvent> {
        prop_oneof![
            (0i32..4, 0i32..4).prop_map(|(w, h)| InputEvent::Resized {
                size: IVec2::new(w, h)
            }),
            any::<bool>().prop_map(InputEvent::Focused),
            any::<bool>().prop_map(InputEvent::Minimized),
            any::<bool>().prop_map(InputEvent::Fullscreen),
        ]
    }

    proptest! {
        #[test]
        fn prop_changed_flags_match_diff(
            frames in proptest::collection::vec(
                proptest::collection::vec(window_event(), 0..6),
                1..8,
            )
        ) {
            let mut buffer = InputBuffer::new();
            let mut previous = *buffer.advance_frame(FRAME);

            for events in frames {
                for event in &events {
                    buffer.record_event(event);
                }
                let stable = *buffer.advance_frame(FRAME);
                prop_assert_eq!(stable.screen_size_changed, stable.screen_size != previous.screen_size);
                prop_assert_eq!(stable.is_focused_changed, stable.is_focused != previous.is_focused);
                prop_assert_eq!(stable.is_minimized_changed, stable.is_minimized != previous.is_minimized);
                prop_assert_eq!(stable.is_fullscreen_changed, stable.is_fullscreen != previous.is_fullscreen);
                previous = stable;
            }

            // A quiet frame changes nothing.
            let quiet = *buffer.advance_frame(FRAME);
            prop_assert!(!quiet.any_changed());
            prop_assert_eq!(quiet.screen_size, previous.screen_size);
            prop_assert_eq!(quiet.is_focused, previous.is_focused);
        }
    }
}
