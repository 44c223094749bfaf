//! Keyboard and mouse sampling into per-tick input frames

use crate::presentation::Camera;
use macroquad::prelude::*;
use shared::{InputFrame, Vector2};

/// Samples the keyboard each tick and edge-detects one-shot keys
pub struct InputManager {
    prev_reload: bool,
}

impl InputManager {
    pub fn new() -> Self {
        Self { prev_reload: false }
    }

    /// Builds the input for one tick; the mouse position is mapped to world
    /// coordinates through `camera`
    pub fn sample(&mut self, camera: &Camera) -> InputFrame {
        let (mouse_x, mouse_y) = mouse_position();
        let reload_key = is_key_down(KeyCode::R);

        let frame = InputFrame {
            left: is_key_down(KeyCode::A) || is_key_down(KeyCode::Left),
            right: is_key_down(KeyCode::D) || is_key_down(KeyCode::Right),
            up: is_key_down(KeyCode::W) || is_key_down(KeyCode::Up) || is_key_down(KeyCode::Space),
            down: is_key_down(KeyCode::S) || is_key_down(KeyCode::Down),
            fire: is_mouse_button_down(MouseButton::Left),
            reload: Self::pressed(reload_key, self.prev_reload),
            aim: camera.to_world(Vector2::new(mouse_x, mouse_y)),
        };

        self.prev_reload = reload_key;
        frame
    }

    /// Rising edge of a key
    fn pressed(current: bool, previous: bool) -> bool {
        current && !previous
    }

    pub fn quit_requested(&self) -> bool {
        is_key_pressed(KeyCode::Escape)
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}
