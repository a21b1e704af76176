use glam::{Mat4, Vec3};

pub const YAW: f32 = -90.0;
pub const PITCH: f32 = 0.0;
pub const SPEED: f32 = 2.5;
pub const SENSITIVITY: f32 = 0.1;
pub const ZOOM: f32 = 45.0;

pub const PITCH_LIMIT: f32 = 89.0;
pub const ZOOM_MIN: f32 = 1.0;
pub const ZOOM_MAX: f32 = 45.0;

const NEAR_PLANE: f32 = 0.1;
const FAR_PLANE: f32 = 100.0;

/// Movement directions, decoupled from any windowing system's key codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraMovement {
    Forward,
    Backward,
    Left,
    Right,
}

/// First-person camera driven by Euler angles (degrees)
///
/// `front`, `right` and `up` are always recomputed from `yaw`/`pitch` and the
/// world up vector, never updated incrementally.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub movement_speed: f32,
    pub mouse_sensitivity: f32,
    front: Vec3,
    up: Vec3,
    right: Vec3,
    world_up: Vec3,
    yaw: f32,
    pitch: f32,
    zoom: f32,
}

impl Camera {
    /// Camera looking down -Z (yaw -90°, pitch 0°)
    pub fn new(position: Vec3, world_up: Vec3) -> Self {
        Self::with_orientation(position, world_up, YAW, PITCH)
    }

    pub fn with_orientation(position: Vec3, world_up: Vec3, yaw: f32, pitch: f32) -> Self {
        let mut camera = Self {
            position,
            movement_speed: SPEED,
            mouse_sensitivity: SENSITIVITY,
            front: Vec3::NEG_Z,
            up: world_up,
            right: Vec3::X,
            world_up,
            yaw,
            pitch,
            zoom: ZOOM,
        };
        camera.update_vectors();
        camera
    }

    pub fn front(&self) -> Vec3 {
        self.front
    }

    pub fn right(&self) -> Vec3 {
        self.right
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn world_up(&self) -> Vec3 {
        self.world_up
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Field of view in degrees, always within [ZOOM_MIN, ZOOM_MAX]
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front, self.up)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.zoom.to_radians(), aspect, NEAR_PLANE, FAR_PLANE)
    }

    pub fn process_keyboard(&mut self, direction: CameraMovement, delta_time: f32) {
        let velocity = self.movement_speed * delta_time;
        match direction {
            CameraMovement::Forward => self.position += self.front * velocity,
            CameraMovement::Backward => self.position -= self.front * velocity,
            CameraMovement::Left => self.position -= self.right * velocity,
            CameraMovement::Right => self.position += self.right * velocity,
        }
    }

    /// `y_offset` must already be inverted for screen space (previous y minus current y)
    pub fn process_mouse_movement(&mut self, x_offset: f32, y_offset: f32, constrain_pitch: bool) {
        self.yaw += x_offset * self.mouse_sensitivity;
        self.pitch += y_offset * self.mouse_sensitivity;

        if constrain_pitch {
            self.pitch = self.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        }

        self.update_vectors();
    }

    pub fn process_mouse_scroll(&mut self, y_offset: f32) {
        self.zoom = (self.zoom - y_offset).clamp(ZOOM_MIN, ZOOM_MAX);
    }

    fn update_vectors(&mut self) {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        self.front = Vec3::new(
            yaw.cos() * pitch.cos(),
            pitch.sin(),
            yaw.sin() * pitch.cos(),
        )
        .normalize();
        // right before up so that up stays orthogonal to the new front
        self.right = self.front.cross(self.world_up).normalize();
        self.up = self.right.cross(self.front).normalize();
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::Y)
    }
}
