pub mod controller;
pub mod importer;
pub mod renderer;

pub use controller::*;
pub use importer::*;
pub use renderer::*;
