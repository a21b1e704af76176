pub mod clock;
pub mod gpu_context;
pub mod input_adapter;
pub mod recording;
pub mod wgpu_backend;

pub use clock::Clock;
pub use gpu_context::{GpuContext, GpuError};
pub use input_adapter::{FrameInput, WinitController};
pub use recording::RecordingBackend;
pub use wgpu_backend::WgpuBackend;
