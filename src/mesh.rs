use std::collections::HashMap;
use std::mem::{offset_of, size_of};

use thiserror::Error;

use crate::texture::{TextureId, TextureKind, TextureRef, TextureRegistry};
use crate::traits::RenderBackend;

/// Interleaved vertex: position, normal, texture coordinate
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl Vertex {
    pub const STRIDE: usize = size_of::<Vertex>();

    pub const fn new(position: [f32; 3], normal: [f32; 3], tex_coords: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            tex_coords,
        }
    }
}

/// One float attribute inside a [`Vertex`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub components: u32,
    pub offset: usize,
}

/// Fixed attribute layout: 0 = position, 1 = normal, 2 = texcoord
pub const VERTEX_LAYOUT: [VertexAttribute; 3] = [
    VertexAttribute { location: 0, components: 3, offset: offset_of!(Vertex, position) },
    VertexAttribute { location: 1, components: 3, offset: offset_of!(Vertex, normal) },
    VertexAttribute { location: 2, components: 2, offset: offset_of!(Vertex, tex_coords) },
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MeshError {
    #[error("index count {0} is not a multiple of 3")]
    PartialTriangle(usize),

    #[error("index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: usize },
}

/// A texture unit assignment produced for one draw
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerBinding {
    /// Uniform name, e.g. `material.texture_diffuse1`
    pub name: String,
    pub unit: u32,
    pub texture: TextureId,
}

/// Assigns sequential texture units and per-kind 1-based sampler names
pub fn sampler_bindings(textures: &[TextureRef]) -> Vec<SamplerBinding> {
    let mut counters: HashMap<&TextureKind, u32> = HashMap::new();

    textures
        .iter()
        .enumerate()
        .map(|(unit, texture)| {
            let number = counters.entry(&texture.kind).or_insert(0);
            *number += 1;
            SamplerBinding {
                name: format!("material.{}{}", texture.kind.sampler_prefix(), number),
                unit: unit as u32,
                texture: texture.id,
            }
        })
        .collect()
}

/// Renderer-ready geometry: GPU buffers plus texture references
pub struct Mesh<B: RenderBackend> {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    textures: Vec<TextureRef>,
    buffers: B::MeshBuffers,
}

impl<B: RenderBackend> Mesh<B> {
    /// Validates the index list and uploads both buffers immediately
    pub fn new(
        backend: &mut B,
        vertices: Vec<Vertex>,
        indices: Vec<u32>,
        textures: Vec<TextureRef>,
    ) -> Result<Self, MeshError> {
        if indices.len() % 3 != 0 {
            return Err(MeshError::PartialTriangle(indices.len()));
        }
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(MeshError::IndexOutOfRange {
                index,
                vertex_count: vertices.len(),
            });
        }

        let buffers = backend.create_mesh_buffers(&vertices, &indices);
        Ok(Self {
            vertices,
            indices,
            textures,
            buffers,
        })
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn textures(&self) -> &[TextureRef] {
        &self.textures
    }

    pub fn buffers(&self) -> &B::MeshBuffers {
        &self.buffers
    }

    /// Binds textures to units 0.. and issues one indexed draw
    ///
    /// Leaves the texture units bound afterwards.
    pub fn draw(&self, backend: &mut B, program: &B::Program, registry: &TextureRegistry<B::Texture>) {
        for binding in sampler_bindings(&self.textures) {
            let Some(texture) = registry.get(binding.texture) else {
                log::warn!("mesh references unknown texture {:?}", binding.texture);
                continue;
            };
            backend.set_sampler(program, &binding.name, binding.unit);
            backend.bind_texture(binding.unit, texture);
        }

        backend.draw_indexed(program, &self.buffers, self.indices.len() as u32);
    }
}

impl<B: RenderBackend> std::fmt::Debug for Mesh<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mesh")
            .field("vertices", &self.vertices.len())
            .field("indices", &self.indices.len())
            .field("textures", &self.textures)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::recording::{Call, RecordingBackend};

    fn triangle() -> Vec<Vertex> {
        vec![
            Vertex::new([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
            Vertex::new([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
            Vertex::new([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
        ]
    }

    #[test]
    fn test_vertex_layout_is_interleaved() {
        assert_eq!(Vertex::STRIDE, 32);
        let offsets: Vec<_> = VERTEX_LAYOUT.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, [0, 12, 24]);
        let components: u32 = VERTEX_LAYOUT.iter().map(|a| a.components).sum();
        assert_eq!(components as usize * 4, Vertex::STRIDE);
    }

    #[test]
    fn test_sampler_names_count_per_kind() {
        let mut registry = TextureRegistry::new(true);
        let d1 = registry.insert("d1", ());
        let d2 = registry.insert("d2", ());
        let s1 = registry.insert("s1", ());
        let textures = vec![
            TextureRef { kind: TextureKind::Diffuse, id: d1 },
            TextureRef { kind: TextureKind::Diffuse, id: d2 },
            TextureRef { kind: TextureKind::Specular, id: s1 },
        ];

        let bindings = sampler_bindings(&textures);
        let names: Vec<_> = bindings.iter().map(|b| b.name.as_str()).collect();
        let units: Vec<_> = bindings.iter().map(|b| b.unit).collect();
        assert_eq!(
            names,
            ["material.texture_diffuse1", "material.texture_diffuse2", "material.texture_specular1"]
        );
        assert_eq!(units, [0, 1, 2]);
    }

    #[test]
    fn test_counters_do_not_leak_between_kinds() {
        let mut registry = TextureRegistry::new(true);
        let ids: Vec<_> = (0..3).map(|i| registry.insert(format!("t{i}"), ())).collect();
        let textures = vec![
            TextureRef { kind: TextureKind::Specular, id: ids[0] },
            TextureRef { kind: TextureKind::Diffuse, id: ids[1] },
            TextureRef { kind: TextureKind::Specular, id: ids[2] },
        ];
        let names: Vec<_> = sampler_bindings(&textures).into_iter().map(|b| b.name).collect();
        assert_eq!(
            names,
            ["material.texture_specular1", "material.texture_diffuse1", "material.texture_specular2"]
        );
    }

    #[test]
    fn test_rejects_partial_triangle() {
        let mut backend = RecordingBackend::new();
        let result = Mesh::new(&mut backend, triangle(), vec![0, 1], vec![]);
        assert_eq!(result.err(), Some(MeshError::PartialTriangle(2)));
        assert_eq!(backend.live_buffers(), 0);
    }

    #[test]
    fn test_rejects_out_of_range_index() {
        let mut backend = RecordingBackend::new();
        let result = Mesh::new(&mut backend, triangle(), vec![0, 1, 3], vec![]);
        assert_eq!(
            result.err(),
            Some(MeshError::IndexOutOfRange { index: 3, vertex_count: 3 })
        );
    }

    #[test]
    fn test_untextured_draw_binds_nothing() {
        let mut backend = RecordingBackend::new();
        let program = backend.builtin_program();
        let registry = TextureRegistry::new(true);
        let mesh = Mesh::new(&mut backend, triangle(), vec![0, 1, 2], vec![]).unwrap();

        backend.clear_calls();
        mesh.draw(&mut backend, &program, &registry);

        assert_eq!(backend.calls(), &[Call::DrawIndexed { index_count: 3 }]);
    }

    #[test]
    fn test_buffers_released_on_drop() {
        let mut backend = RecordingBackend::new();
        let mesh = Mesh::new(&mut backend, triangle(), vec![0, 1, 2], vec![]).unwrap();
        assert_eq!(backend.live_buffers(), 1);
        drop(mesh);
        assert_eq!(backend.live_buffers(), 0);
    }
}
