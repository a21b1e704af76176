use std::cell::Cell;
use std::rc::Rc;

use glam::Mat4;

use crate::mesh::Vertex;
use crate::shader::{ShaderError, ShaderSource, ShaderStage};
use crate::texture::TextureImage;
use crate::traits::RenderBackend;

/// One backend call as observed by [`RecordingBackend`]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateMeshBuffers { vertices: usize, indices: usize },
    UploadTexture { texture: u64, width: u32, height: u32 },
    CompileProgram,
    SetMat4 { name: String, value: Mat4 },
    SetSampler { name: String, unit: u32 },
    BindTexture { unit: u32, texture: u64 },
    DrawIndexed { index_count: u32 },
}

/// Headless backend that records every call instead of touching a GPU
///
/// Handles count themselves in and out of the live counters so resource
/// release can be observed.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    calls: Vec<Call>,
    live_buffers: Rc<Cell<usize>>,
    live_textures: Rc<Cell<usize>>,
    next_texture: u64,
}

#[derive(Debug)]
pub struct RecordedBuffers {
    pub vertex_count: usize,
    pub index_count: usize,
    live: Rc<Cell<usize>>,
}

impl Drop for RecordedBuffers {
    fn drop(&mut self) {
        self.live.set(self.live.get() - 1);
    }
}

#[derive(Debug)]
pub struct RecordedTexture {
    pub id: u64,
    pub width: u32,
    pub height: u32,
    live: Rc<Cell<usize>>,
}

impl Drop for RecordedTexture {
    fn drop(&mut self) {
        self.live.set(self.live.get() - 1);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedProgram;

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Program handle for the built-in shader; recording never fails on it
    pub fn builtin_program(&mut self) -> RecordedProgram {
        self.calls.push(Call::CompileProgram);
        RecordedProgram
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn draw_count(&self) -> usize {
        self.count(|call| matches!(call, Call::DrawIndexed { .. }))
    }

    pub fn texture_bind_count(&self) -> usize {
        self.count(|call| matches!(call, Call::BindTexture { .. }))
    }

    pub fn upload_count(&self) -> usize {
        self.count(|call| matches!(call, Call::UploadTexture { .. }))
    }

    /// Sampler uniforms set so far, in call order
    pub fn sampler_names(&self) -> Vec<(String, u32)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::SetSampler { name, unit } => Some((name.clone(), *unit)),
                _ => None,
            })
            .collect()
    }

    pub fn live_buffers(&self) -> usize {
        self.live_buffers.get()
    }

    pub fn live_textures(&self) -> usize {
        self.live_textures.get()
    }

    fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(call)).count()
    }
}

impl RenderBackend for RecordingBackend {
    type MeshBuffers = RecordedBuffers;
    type Texture = RecordedTexture;
    type Program = RecordedProgram;

    fn create_mesh_buffers(&mut self, vertices: &[Vertex], indices: &[u32]) -> RecordedBuffers {
        self.calls.push(Call::CreateMeshBuffers {
            vertices: vertices.len(),
            indices: indices.len(),
        });
        self.live_buffers.set(self.live_buffers.get() + 1);
        RecordedBuffers {
            vertex_count: vertices.len(),
            index_count: indices.len(),
            live: Rc::clone(&self.live_buffers),
        }
    }

    fn upload_texture(&mut self, image: &TextureImage) -> RecordedTexture {
        let id = self.next_texture;
        self.next_texture += 1;
        self.calls.push(Call::UploadTexture {
            texture: id,
            width: image.width,
            height: image.height,
        });
        self.live_textures.set(self.live_textures.get() + 1);
        RecordedTexture {
            id,
            width: image.width,
            height: image.height,
            live: Rc::clone(&self.live_textures),
        }
    }

    fn compile_program(&mut self, source: &ShaderSource) -> Result<RecordedProgram, ShaderError> {
        for stage in [ShaderStage::Vertex, ShaderStage::Fragment] {
            if source.source(stage).trim().is_empty() {
                return Err(ShaderError::Compile {
                    stage,
                    log: "empty source".to_string(),
                });
            }
        }
        self.calls.push(Call::CompileProgram);
        Ok(RecordedProgram)
    }

    fn set_mat4(&mut self, _program: &RecordedProgram, name: &str, value: Mat4) {
        self.calls.push(Call::SetMat4 {
            name: name.to_string(),
            value,
        });
    }

    fn set_sampler(&mut self, _program: &RecordedProgram, name: &str, unit: u32) {
        self.calls.push(Call::SetSampler {
            name: name.to_string(),
            unit,
        });
    }

    fn bind_texture(&mut self, unit: u32, texture: &RecordedTexture) {
        self.calls.push(Call::BindTexture {
            unit,
            texture: texture.id,
        });
    }

    fn draw_indexed(&mut self, _program: &RecordedProgram, _buffers: &RecordedBuffers, index_count: u32) {
        self.calls.push(Call::DrawIndexed { index_count });
    }
}
