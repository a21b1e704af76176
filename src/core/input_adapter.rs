use std::collections::HashSet;
use winit::event::{DeviceEvent, ElementState, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use crate::camera::{Camera, CameraMovement};
use crate::traits::controller::{Button, Controller};

/// Pixels of trackpad scroll that count as one wheel notch
const PIXELS_PER_LINE: f32 = 20.0;

/// Input gathered for one frame, owned by the draw loop
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameInput {
    /// Seconds since the previous frame
    pub delta_time: f32,
    pub movements: Vec<CameraMovement>,
    /// Cursor delta with y already inverted (previous y minus current y)
    pub look: (f32, f32),
    pub scroll: f32,
}

impl FrameInput {
    pub fn apply_to(&self, camera: &mut Camera) {
        for &movement in &self.movements {
            camera.process_keyboard(movement, self.delta_time);
        }
        if self.look != (0.0, 0.0) {
            camera.process_mouse_movement(self.look.0, self.look.1, true);
        }
        if self.scroll != 0.0 {
            camera.process_mouse_scroll(self.scroll);
        }
    }
}

/// Adapter that bridges Winit events to the Controller trait
#[derive(Debug, Clone)]
pub struct WinitController {
    /// Currently pressed buttons
    pressed_keys: HashSet<Button>,
    /// Pressed buttons in press order
    pressed_vec: Vec<Button>,
    /// Last cursor sample; `None` until the first sample arrives
    mouse_position: Option<(f32, f32)>,
    /// Cursor movement (screen space) since last reset
    mouse_delta: (f32, f32),
    /// Scroll in wheel lines since last reset
    scroll_delta: f32,
    /// Look deltas come from raw device motion instead of cursor positions
    raw_motion: bool,
    focused: bool,
}

impl WinitController {
    pub fn new() -> Self {
        Self {
            pressed_keys: HashSet::new(),
            pressed_vec: Vec::new(),
            mouse_position: None,
            mouse_delta: (0.0, 0.0),
            scroll_delta: 0.0,
            raw_motion: false,
            focused: true,
        }
    }

    /// Switch look input to raw device motion, used while the cursor is grabbed
    pub fn set_raw_motion(&mut self, enabled: bool) {
        self.raw_motion = enabled;
        self.reset_cursor();
    }

    pub fn raw_motion(&self) -> bool {
        self.raw_motion
    }

    /// Process a Winit DeviceEvent (raw mouse motion)
    pub fn process_device_event(&mut self, event: &DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta } = event {
            self.mouse_motion(delta.0 as f32, delta.1 as f32);
        }
    }

    /// Raw motion in screen orientation (y grows downwards)
    pub fn mouse_motion(&mut self, dx: f32, dy: f32) {
        if self.raw_motion && self.focused {
            self.mouse_delta.0 += dx;
            self.mouse_delta.1 += dy;
        }
    }

    /// Process a Winit WindowEvent and update internal state
    pub fn process_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(keycode) = event.physical_key {
                    if let Some(button) = Self::keycode_to_button(keycode) {
                        self.set_button(button, event.state);
                    }
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor_moved(position.x as f32, position.y as f32);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                self.scroll_delta += match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(position) => position.y as f32 / PIXELS_PER_LINE,
                };
            }
            WindowEvent::Focused(focused) => {
                self.focused = *focused;
                if *focused {
                    self.reset_cursor();
                } else {
                    // key releases are not delivered while unfocused
                    self.pressed_keys.clear();
                    self.pressed_vec.clear();
                }
            }
            _ => {}
        }
    }

    /// First sample after a reset only records the position
    pub fn cursor_moved(&mut self, x: f32, y: f32) {
        if let (false, Some((old_x, old_y))) = (self.raw_motion, self.mouse_position) {
            self.mouse_delta.0 += x - old_x;
            self.mouse_delta.1 += y - old_y;
        }
        self.mouse_position = Some((x, y));
    }

    /// Forget the tracked cursor so the next sample cannot cause a jump
    pub fn reset_cursor(&mut self) {
        self.mouse_position = None;
    }

    pub fn set_button(&mut self, button: Button, state: ElementState) {
        match state {
            ElementState::Pressed => {
                if self.pressed_keys.insert(button) {
                    self.pressed_vec.push(button);
                }
            }
            ElementState::Released => {
                if self.pressed_keys.remove(&button) {
                    self.pressed_vec.retain(|&b| b != button);
                }
            }
        }
    }

    /// Snapshot of this frame's input
    pub fn frame_input(&self, delta_time: f32) -> FrameInput {
        FrameInput {
            delta_time,
            movements: self.movements(),
            look: (self.mouse_delta.0, -self.mouse_delta.1),
            scroll: self.scroll_delta,
        }
    }

    /// Reset per-frame state (mouse and scroll deltas)
    /// Call this at the end of each frame after processing input
    pub fn reset_deltas(&mut self) {
        self.mouse_delta = (0.0, 0.0);
        self.scroll_delta = 0.0;
    }

    pub fn mouse_position(&self) -> Option<(f32, f32)> {
        self.mouse_position
    }

    pub fn mouse_delta(&self) -> (f32, f32) {
        self.mouse_delta
    }

    fn keycode_to_button(keycode: KeyCode) -> Option<Button> {
        match keycode {
            KeyCode::KeyW => Some(Button::KeyW),
            KeyCode::KeyA => Some(Button::KeyA),
            KeyCode::KeyS => Some(Button::KeyS),
            KeyCode::KeyD => Some(Button::KeyD),
            KeyCode::Escape => Some(Button::Escape),
            _ => None,
        }
    }
}

impl Default for WinitController {
    fn default() -> Self {
        Self::new()
    }
}

impl Controller for WinitController {
    fn is_down(&self, button: Button) -> bool {
        self.pressed_keys.contains(&button)
    }

    fn down_buttons(&self) -> &[Button] {
        &self.pressed_vec
    }
}
