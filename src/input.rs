//! Input buffering and the per-tick input snapshot.
//!
//! winit delivers events between frames. They are translated into
//! [`InputEvent`]s and pushed onto an [`InputQueue`]. At the start of each
//! tick the queue is drained into the [`InputState`] snapshot, which yields
//! [`Command`]s for the camera and entity. After that the snapshot is only
//! read for the rest of the tick.

use std::collections::HashSet;

use winit::{
    event::{DeviceEvent, ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent},
    keyboard::Key,
};

use crate::config::InputConfig;

#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    KeyDown { key: String, repeat: bool },
    KeyUp { key: String },
    /// Raw pointer motion in pixels, y grows downwards.
    MouseMotion { dx: f32, dy: f32 },
    /// Positive values zoom out.
    Scroll { delta: f32 },
    Click,
    /// The window lost focus; held keys will never see their key up.
    FocusLost,
    /// Reported back by the host once a capture/release request was carried out.
    PointerCaptured(bool),
}

/// What an ingested event asks the rest of the viewer to do.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    Rotate { dx: f32, dy: f32 },
    Zoom(f32),
    ToggleSpotlight,
    CapturePointer,
    ReleasePointer,
}

/// Events collected since the last tick, oldest first.
#[derive(Debug, Default)]
pub struct InputQueue {
    events: Vec<InputEvent>,
}

impl InputQueue {
    pub fn push(&mut self, event: InputEvent) {
        self.events.push(event);
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, InputEvent> {
        self.events.drain(..)
    }
}

/// Keys currently held and whether the pointer is captured.
#[derive(Clone, Debug, Default)]
pub struct InputState {
    pressed: HashSet<String>,
    pointer_captured: bool,
}

impl InputState {
    pub fn is_pressed(&self, key: &str) -> bool {
        self.pressed.contains(key)
    }

    /// Fold one event into the snapshot. Key state is last-writer-wins.
    pub fn apply(&mut self, event: InputEvent, bindings: &InputConfig) -> Option<Command> {
        match event {
            InputEvent::KeyDown { key, repeat } => {
                let command = if repeat {
                    None
                } else if key == bindings.toggle_spotlight {
                    Some(Command::ToggleSpotlight)
                } else if key == bindings.release_pointer && self.pointer_captured {
                    Some(Command::ReleasePointer)
                } else {
                    None
                };
                self.pressed.insert(key);
                command
            }
            InputEvent::KeyUp { key } => {
                self.pressed.remove(&key);
                None
            }
            // Mouse look only while the pointer is captured
            InputEvent::MouseMotion { dx, dy } if self.pointer_captured => {
                Some(Command::Rotate { dx, dy: -dy })
            }
            InputEvent::MouseMotion { .. } => None,
            InputEvent::Scroll { delta } => Some(Command::Zoom(delta)),
            InputEvent::Click if !self.pointer_captured => Some(Command::CapturePointer),
            InputEvent::Click => None,
            InputEvent::FocusLost => {
                self.pressed.clear();
                // The grab is still held by the host until it reports back
                self.pointer_captured.then_some(Command::ReleasePointer)
            }
            InputEvent::PointerCaptured(captured) => {
                self.pointer_captured = captured;
                None
            }
        }
    }

    pub fn movement(&self, bindings: &InputConfig) -> MovementFlags {
        MovementFlags {
            forward: self.is_pressed(&bindings.forward),
            back: self.is_pressed(&bindings.back),
            left: self.is_pressed(&bindings.left),
            right: self.is_pressed(&bindings.right),
            up: self.is_pressed(&bindings.up),
            down: self.is_pressed(&bindings.down),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MovementFlags {
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
}

impl MovementFlags {
    pub fn any_horizontal(&self) -> bool {
        self.forward || self.back || self.left || self.right
    }
}

/// Lowercase name of a logical key, e.g. `"w"` or `"escape"`.
pub fn key_name(key: &Key) -> Option<String> {
    match key {
        Key::Character(c) => Some(c.to_lowercase()),
        Key::Named(named) => Some(format!("{named:?}").to_lowercase()),
        _ => None,
    }
}

pub fn translate_window_event(event: &WindowEvent) -> Option<InputEvent> {
    match event {
        WindowEvent::KeyboardInput {
            event:
                KeyEvent {
                    logical_key,
                    state,
                    repeat,
                    ..
                },
            ..
        } => {
            let key = key_name(logical_key)?;
            Some(match state {
                ElementState::Pressed => InputEvent::KeyDown {
                    key,
                    repeat: *repeat,
                },
                ElementState::Released => InputEvent::KeyUp { key },
            })
        }
        WindowEvent::MouseWheel { delta, .. } => Some(InputEvent::Scroll {
            delta: scroll_amount(delta),
        }),
        WindowEvent::MouseInput {
            state: ElementState::Pressed,
            button: MouseButton::Left,
            ..
        } => Some(InputEvent::Click),
        WindowEvent::Focused(false) => Some(InputEvent::FocusLost),
        _ => None,
    }
}

pub fn translate_device_event(event: &DeviceEvent) -> Option<InputEvent> {
    match event {
        DeviceEvent::MouseMotion { delta: (dx, dy) } => Some(InputEvent::MouseMotion {
            dx: *dx as f32,
            dy: *dy as f32,
        }),
        _ => None,
    }
}

/// winit reports scrolling towards the screen as positive, which zooms in.
fn scroll_amount(delta: &MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => -y,
        MouseScrollDelta::PixelDelta(position) => -position.y as f32,
    }
}

#[cfg(test)]
mod tests {
    use winit::keyboard::NamedKey;

    use super::*;

    fn down(key: &str) -> InputEvent {
        InputEvent::KeyDown {
            key: key.into(),
            repeat: false,
        }
    }

    #[test]
    fn key_names_are_lowercase() {
        assert_eq!(key_name(&Key::Character("W".into())).as_deref(), Some("w"));
        assert_eq!(
            key_name(&Key::Named(NamedKey::Escape)).as_deref(),
            Some("escape")
        );
    }

    #[test]
    fn last_event_wins_for_key_state() {
        let bindings = InputConfig::default();
        let mut state = InputState::default();
        state.apply(down("w"), &bindings);
        state.apply(InputEvent::KeyUp { key: "w".into() }, &bindings);
        state.apply(down("w"), &bindings);
        assert!(state.is_pressed("w"));
        assert!(state.movement(&bindings).forward);
        assert!(state.movement(&bindings).any_horizontal());

        state.apply(InputEvent::KeyUp { key: "w".into() }, &bindings);
        assert_eq!(state.movement(&bindings), MovementFlags::default());
    }

    #[test]
    fn vertical_keys_are_not_horizontal_movement() {
        let bindings = InputConfig::default();
        let mut state = InputState::default();
        state.apply(down("q"), &bindings);
        let flags = state.movement(&bindings);
        assert!(flags.up);
        assert!(!flags.any_horizontal());
    }

    #[test]
    fn toggle_fires_once_per_press() {
        let bindings = InputConfig::default();
        let mut state = InputState::default();
        assert_eq!(state.apply(down("l"), &bindings), Some(Command::ToggleSpotlight));
        let repeat = InputEvent::KeyDown {
            key: "l".into(),
            repeat: true,
        };
        assert_eq!(state.apply(repeat, &bindings), None);
    }

    #[test]
    fn mouse_look_requires_a_captured_pointer() {
        let bindings = InputConfig::default();
        let mut state = InputState::default();
        let motion = InputEvent::MouseMotion { dx: 4.0, dy: 2.0 };
        assert_eq!(state.apply(motion.clone(), &bindings), None);
        assert_eq!(state.apply(InputEvent::Click, &bindings), Some(Command::CapturePointer));

        state.apply(InputEvent::PointerCaptured(true), &bindings);
        assert_eq!(
            state.apply(motion, &bindings),
            Some(Command::Rotate { dx: 4.0, dy: -2.0 })
        );
        assert_eq!(state.apply(InputEvent::Click, &bindings), None);
        assert_eq!(state.apply(down("escape"), &bindings), Some(Command::ReleasePointer));
    }

    #[test]
    fn losing_focus_drops_held_keys() {
        let bindings = InputConfig::default();
        let mut state = InputState::default();
        state.apply(down("w"), &bindings);
        state.apply(down("q"), &bindings);
        assert_eq!(state.apply(InputEvent::FocusLost, &bindings), None);
        assert_eq!(state.movement(&bindings), MovementFlags::default());

        state.apply(down("d"), &bindings);
        state.apply(InputEvent::PointerCaptured(true), &bindings);
        assert_eq!(
            state.apply(InputEvent::FocusLost, &bindings),
            Some(Command::ReleasePointer)
        );
        assert!(!state.is_pressed("d"));
        assert_eq!(
            translate_window_event(&WindowEvent::Focused(false)),
            Some(InputEvent::FocusLost)
        );
    }

    #[test]
    fn mouse_motion_is_translated() {
        let event = DeviceEvent::MouseMotion { delta: (3.0, -1.5) };
        assert_eq!(
            translate_device_event(&event),
            Some(InputEvent::MouseMotion { dx: 3.0, dy: -1.5 })
        );
    }

    #[test]
    fn scrolling_towards_the_screen_zooms_in() {
        assert!(scroll_amount(&MouseScrollDelta::LineDelta(0.0, 1.0)) < 0.0);
        assert!(scroll_amount(&MouseScrollDelta::LineDelta(0.0, -2.0)) > 0.0);
    }
}
