//! Input system for handling mouse input
//!
//! Translates winit mouse events into orbit camera movements:
//! left-drag orbits around the origin, right-drag zooms.

use std::collections::HashSet;

use tracing::trace;
use winit::event::{ElementState, MouseButton};

use crate::component::OrbitCamera;

/// InputSystem manages mouse button state and the last cursor position
pub struct InputSystem {
    mouse_buttons: HashSet<MouseButton>,
    cursor_pos: (f32, f32),
}

impl InputSystem {
    pub fn new() -> Self {
        Self {
            mouse_buttons: HashSet::new(),
            cursor_pos: (0.0, 0.0),
        }
    }

    /// Process mouse button event
    ///
    /// A press anchors the drag at the current cursor position.
    pub fn on_mouse_button(
        &mut self,
        camera: &mut OrbitCamera,
        button: MouseButton,
        state: ElementState,
    ) {
        match state {
            ElementState::Pressed => {
                self.mouse_buttons.insert(button);
                camera.on_mouse_down(self.cursor_pos.0, self.cursor_pos.1);
            }
            ElementState::Released => {
                self.mouse_buttons.remove(&button);
            }
        }
    }

    /// Process mouse movement event
    pub fn on_cursor_moved(&mut self, camera: &mut OrbitCamera, position: (f64, f64)) {
        let (x, y) = (position.0 as f32, position.1 as f32);
        self.cursor_pos = (x, y);

        if self.mouse_buttons.contains(&MouseButton::Left) {
            camera.orbit(x, y);
        } else if self.mouse_buttons.contains(&MouseButton::Right) {
            camera.zoom(x, y);
        } else {
            camera.track(x, y);
            return;
        }

        let (theta, phi, radius) = camera.spherical();
        trace!(theta, phi, radius, "Camera moved");
    }

    pub fn is_pressed(&self, button: MouseButton) -> bool {
        self.mouse_buttons.contains(&button)
    }
}

impl Default for InputSystem {
    fn default() -> Self {
        Self::new()
    }
}
