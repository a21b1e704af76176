pub mod gltf;

use std::path::PathBuf;

use thiserror::Error;

pub use self::gltf::GltfImporter;

/// Post-processing requested from a scene importer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportFlags {
    /// Split strips, fans and polygons into triangles
    pub triangulate: bool,
    /// Deliver texture coordinates with a top-left origin; bottom-left otherwise
    pub flip_uvs: bool,
}

impl Default for ImportFlags {
    fn default() -> Self {
        Self {
            triangulate: true,
            flip_uvs: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to load glTF file {path}: {source}")]
    Gltf {
        path: PathBuf,
        #[source]
        source: ::gltf::Error,
    },

    #[error("unsupported scene format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("node hierarchy of {path} is not a tree: node {node} has more than one parent")]
    NotATree { path: PathBuf, node: usize },
}
