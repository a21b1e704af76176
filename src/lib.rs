pub mod app;
pub mod camera;
pub mod cli;
pub mod core;
pub mod loaders;
pub mod mesh;
pub mod model;
pub mod scene;
pub mod shader;
pub mod texture;
pub mod traits;

pub use camera::{Camera, CameraMovement};
pub use model::{FailurePolicy, LoadError, LoadOptions, Model, ModelSummary};
pub use scene::SceneGraph;
