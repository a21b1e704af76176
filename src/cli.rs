// cli.rs - Command-line interface configuration
use std::path::PathBuf;

use clap::Parser;
use glam::{Mat4, Vec3};

use crate::camera::{SENSITIVITY, SPEED};
use crate::model::{FailurePolicy, LoadOptions};
use crate::shader::{ShaderError, ShaderSource};

#[derive(Parser, Debug, Clone)]
#[command(name = "model-viewer")]
#[command(about = "Textured glTF model viewer with a fly-through camera", long_about = None)]
pub struct Cli {
    /// Scene file to load (.gltf or .glb)
    #[arg(env = "GLTF_FILE", default_value = "assets/model.gltf")]
    pub model: PathBuf,

    /// WGSL vertex stage replacing the built-in shader
    #[arg(long, requires = "fragment_shader")]
    pub vertex_shader: Option<PathBuf>,

    /// WGSL fragment stage replacing the built-in shader
    #[arg(long, requires = "vertex_shader")]
    pub fragment_shader: Option<PathBuf>,

    #[arg(long, default_value_t = 800)]
    pub width: u32,

    #[arg(long, default_value_t = 600)]
    pub height: u32,

    /// Camera movement speed in units per second
    #[arg(long, default_value_t = SPEED)]
    pub speed: f32,

    /// Degrees of rotation per pixel of cursor movement
    #[arg(long, default_value_t = SENSITIVITY)]
    pub sensitivity: f32,

    /// Uniform scale applied by the model matrix
    #[arg(long, default_value_t = 1.0)]
    pub scale: f32,

    /// Vertical translation applied by the model matrix
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub offset_y: f32,

    /// Fail on the first resource that cannot be loaded
    #[arg(long)]
    pub strict: bool,

    /// Upload a texture once per reference instead of once per path
    #[arg(long)]
    pub no_texture_dedup: bool,

    /// Load the model without a window and print its summary as JSON
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    pub fn policy(&self) -> FailurePolicy {
        if self.strict {
            FailurePolicy::Abort
        } else {
            FailurePolicy::Degrade
        }
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            dedup_textures: !self.no_texture_dedup,
            on_texture_error: self.policy(),
            ..LoadOptions::default()
        }
    }

    /// Shader stages from the command line, or the built-in pair
    pub fn shader_source(&self) -> Result<ShaderSource, ShaderError> {
        match (&self.vertex_shader, &self.fragment_shader) {
            (Some(vertex), Some(fragment)) => ShaderSource::from_files(vertex, fragment),
            _ => Ok(ShaderSource::builtin()),
        }
    }

    /// Translate by `offset_y`, then scale
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_translation(Vec3::new(0.0, self.offset_y, 0.0)) * Mat4::from_scale(Vec3::splat(self.scale))
    }
}
