use std::path::{Path, PathBuf};

use glam::{Mat3, Mat4, Vec2};
use serde::Serialize;
use thiserror::Error;

use crate::loaders::{ImportError, ImportFlags};
use crate::mesh::{Mesh, MeshError, Vertex};
use crate::scene::{NodeId, RawMaterial, RawMesh, SceneGraph};
use crate::texture::{TextureError, TextureImage, TextureKind, TextureRef, TextureRegistry};
use crate::traits::{RenderBackend, SceneImporter};

/// Material channels a model resolves, in binding order
pub const RESOLVED_KINDS: [TextureKind; 2] = [TextureKind::Diffuse, TextureKind::Specular];

/// What to do when a resource fails to load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log and continue with a stand-in resource
    #[default]
    Degrade,
    /// Return the error to the caller
    Abort,
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub import: ImportFlags,
    /// Upload each resolved texture path once per model
    pub dedup_textures: bool,
    /// Bake accumulated node transforms into vertex data
    pub bake_transforms: bool,
    pub on_texture_error: FailurePolicy,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            import: ImportFlags {
                triangulate: true,
                flip_uvs: true,
            },
            dedup_textures: true,
            bake_transforms: true,
            on_texture_error: FailurePolicy::Degrade,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Import(#[from] ImportError),

    #[error("scene {0} is incomplete")]
    IncompleteScene(PathBuf),

    #[error("scene {0} has no root node")]
    MissingRoot(PathBuf),

    #[error("scene node {0:?} has more than one parent")]
    SharedNode(NodeId),

    #[error(transparent)]
    Texture(#[from] TextureError),

    #[error("mesh {mesh} is invalid: {source}")]
    Mesh {
        mesh: usize,
        #[source]
        source: MeshError,
    },
}

/// Statistics about a loaded model
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelSummary {
    pub meshes: usize,
    pub vertices: usize,
    pub indices: usize,
    pub textures: usize,
    pub texture_references: usize,
}

/// Meshes and textures loaded from one scene file
///
/// Owns every GPU resource it created; dropping the model releases them.
pub struct Model<B: RenderBackend> {
    meshes: Vec<Mesh<B>>,
    textures: TextureRegistry<B::Texture>,
    directory: PathBuf,
}

impl<B: RenderBackend> Model<B> {
    /// Import `path` and upload every mesh it contains
    pub fn load(
        path: impl AsRef<Path>,
        importer: &impl SceneImporter,
        backend: &mut B,
        options: &LoadOptions,
    ) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let scene = importer.import(path, options.import)?;

        if scene.incomplete {
            return Err(LoadError::IncompleteScene(path.to_path_buf()));
        }
        if scene.root.is_none() {
            return Err(LoadError::MissingRoot(path.to_path_buf()));
        }

        let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::from_scene(&scene, directory, backend, options)
    }

    /// Like [`Model::load`], but a failed load yields an empty model
    pub fn load_or_empty(
        path: impl AsRef<Path>,
        importer: &impl SceneImporter,
        backend: &mut B,
        options: &LoadOptions,
    ) -> Self {
        let path = path.as_ref();
        match Self::load(path, importer, backend, options) {
            Ok(model) => model,
            Err(e) => {
                log::error!("Failed to load model {:?}: {}", path, e);
                Self::empty(path.parent().map(Path::to_path_buf).unwrap_or_default(), options)
            }
        }
    }

    /// Build a model from an already parsed scene
    ///
    /// Relative texture paths are resolved against `directory`.
    pub fn from_scene(
        scene: &SceneGraph,
        directory: impl Into<PathBuf>,
        backend: &mut B,
        options: &LoadOptions,
    ) -> Result<Self, LoadError> {
        let mut model = Self::empty(directory.into(), options);
        model.process_scene(scene, backend, options)?;

        let summary = model.summary();
        log::info!(
            "Model loaded from {:?}: {} meshes, {} vertices, {} indices, {} textures",
            model.directory,
            summary.meshes,
            summary.vertices,
            summary.indices,
            summary.textures
        );
        Ok(model)
    }

    fn empty(directory: PathBuf, options: &LoadOptions) -> Self {
        Self {
            meshes: Vec::new(),
            textures: TextureRegistry::new(options.dedup_textures),
            directory,
        }
    }

    pub fn meshes(&self) -> &[Mesh<B>] {
        &self.meshes
    }

    pub fn textures(&self) -> &TextureRegistry<B::Texture> {
        &self.textures
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            meshes: self.meshes.len(),
            vertices: self.meshes.iter().map(|m| m.vertices().len()).sum(),
            indices: self.meshes.iter().map(|m| m.indices().len()).sum(),
            textures: self.textures.len(),
            texture_references: self.meshes.iter().map(|m| m.textures().len()).sum(),
        }
    }

    /// One draw per mesh, in load order
    pub fn draw(&self, backend: &mut B, program: &B::Program) {
        for mesh in &self.meshes {
            mesh.draw(backend, program, &self.textures);
        }
    }

    fn process_scene(&mut self, scene: &SceneGraph, backend: &mut B, options: &LoadOptions) -> Result<(), LoadError> {
        if let Some(node) = scene.shared_node() {
            return Err(LoadError::SharedNode(node));
        }
        for (id, node, world) in scene.depth_first() {
            for &mesh_index in &node.meshes {
                let Some(raw) = scene.meshes.get(mesh_index) else {
                    log::warn!("Node {:?} references missing mesh {}", id, mesh_index);
                    continue;
                };
                let material = raw.material.and_then(|index| scene.materials.get(index));
                let transform = options.bake_transforms.then_some(world);

                let mesh = self.process_mesh(mesh_index, raw, material, transform, backend, options)?;
                self.meshes.push(mesh);
            }
        }
        Ok(())
    }

    fn process_mesh(
        &mut self,
        mesh_index: usize,
        raw: &RawMesh,
        material: Option<&RawMaterial>,
        transform: Option<Mat4>,
        backend: &mut B,
        options: &LoadOptions,
    ) -> Result<Mesh<B>, LoadError> {
        let vertices = build_vertices(raw, transform);

        let mut indices = Vec::with_capacity(raw.faces.len() * 3);
        for face in &raw.faces {
            if face.indices.len() != 3 {
                log::warn!(
                    "Skipping {}-sided face in mesh {:?}",
                    face.indices.len(),
                    raw.name
                );
                continue;
            }
            indices.extend_from_slice(&face.indices);
        }

        let mut textures = Vec::new();
        if let Some(material) = material {
            for kind in &RESOLVED_KINDS {
                textures.extend(self.load_material_textures(material, kind, backend, options)?);
            }
        }

        log::debug!(
            "Mesh {:?}: {} vertices, {} indices, {} textures",
            raw.name,
            vertices.len(),
            indices.len(),
            textures.len()
        );

        Mesh::new(backend, vertices, indices, textures).map_err(|source| LoadError::Mesh {
            mesh: mesh_index,
            source,
        })
    }

    /// Resolves and uploads every texture of `kind` on `material`
    pub fn load_material_textures(
        &mut self,
        material: &RawMaterial,
        kind: &TextureKind,
        backend: &mut B,
        options: &LoadOptions,
    ) -> Result<Vec<TextureRef>, LoadError> {
        let directory = self.directory.clone();
        let mut textures = Vec::new();

        for source in material.textures(kind) {
            let key = source.resolve_key(&directory);
            let id = self.textures.get_or_insert_with(&key, || {
                let image = match TextureImage::load(source, &directory) {
                    Ok(image) => image,
                    Err(e) if options.on_texture_error == FailurePolicy::Degrade => {
                        log::warn!("{e}; using placeholder");
                        TextureImage::placeholder()
                    }
                    Err(e) => return Err(LoadError::Texture(e)),
                };
                Ok(backend.upload_texture(&image))
            })?;

            textures.push(TextureRef {
                kind: kind.clone(),
                id,
            });
        }

        Ok(textures)
    }
}

impl<B: RenderBackend> std::fmt::Debug for Model<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("directory", &self.directory)
            .field("meshes", &self.meshes)
            .field("textures", &self.textures)
            .finish()
    }
}

/// One vertex per input position; missing UVs become (0, 0)
fn build_vertices(raw: &RawMesh, transform: Option<Mat4>) -> Vec<Vertex> {
    let normal_matrix = transform.map(|m| Mat3::from_mat4(m).inverse().transpose());

    raw.positions
        .iter()
        .enumerate()
        .map(|(i, &position)| {
            let normal = raw.normals.get(i).copied().unwrap_or_default();
            let tex_coords = raw
                .tex_coords
                .as_ref()
                .and_then(|coords| coords.get(i).copied())
                .unwrap_or(Vec2::ZERO);

            let (position, normal) = match (transform, normal_matrix) {
                (Some(m), Some(n)) => (m.transform_point3(position), (n * normal).normalize_or_zero()),
                _ => (position, normal),
            };

            Vertex::new(position.to_array(), normal.to_array(), tex_coords.to_array())
        })
        .collect()
}
