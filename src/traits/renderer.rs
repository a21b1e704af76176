use glam::Mat4;

use crate::mesh::Vertex;
use crate::shader::{ShaderError, ShaderSource};
use crate::texture::TextureImage;

/// GPU backend used by meshes and models
///
/// Resource handles release their GPU memory when dropped. Draw-time calls
/// follow the classic bound-state model: uniforms and texture units stay set
/// until overwritten, and `draw_indexed` uses whatever is currently bound.
pub trait RenderBackend {
    /// Vertex buffer plus index buffer for one mesh
    type MeshBuffers;
    /// Uploaded 2D texture
    type Texture;
    /// Linked shader program
    type Program;

    /// Upload interleaved vertices and triangle indices
    fn create_mesh_buffers(&mut self, vertices: &[Vertex], indices: &[u32]) -> Self::MeshBuffers;

    /// Upload an RGBA8 image
    fn upload_texture(&mut self, image: &TextureImage) -> Self::Texture;

    /// Compile both stages and link them
    fn compile_program(&mut self, source: &ShaderSource) -> Result<Self::Program, ShaderError>;

    /// Set a `mat4` uniform such as `model`, `view` or `projection`
    fn set_mat4(&mut self, program: &Self::Program, name: &str, value: Mat4);

    /// Point the sampler uniform `name` at a texture unit; unknown names are ignored
    fn set_sampler(&mut self, program: &Self::Program, name: &str, unit: u32);

    /// Bind a texture to a texture unit
    fn bind_texture(&mut self, unit: u32, texture: &Self::Texture);

    /// Issue one indexed triangle draw
    fn draw_indexed(&mut self, program: &Self::Program, buffers: &Self::MeshBuffers, index_count: u32);
}
