use crate::camera::CameraMovement;

/// Input button identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    KeyW,
    KeyA,
    KeyS,
    KeyD,
    Escape,
}

impl Button {
    /// Camera direction driven by this button, if any
    pub fn movement(self) -> Option<CameraMovement> {
        match self {
            Button::KeyW => Some(CameraMovement::Forward),
            Button::KeyS => Some(CameraMovement::Backward),
            Button::KeyA => Some(CameraMovement::Left),
            Button::KeyD => Some(CameraMovement::Right),
            Button::Escape => None,
        }
    }
}

/// Held-button state
pub trait Controller {
    fn is_down(&self, button: Button) -> bool;

    /// Currently held buttons in press order
    fn down_buttons(&self) -> &[Button];

    /// Camera directions for every held movement button
    fn movements(&self) -> Vec<CameraMovement> {
        self.down_buttons()
            .iter()
            .filter_map(|button| button.movement())
            .collect()
    }
}
