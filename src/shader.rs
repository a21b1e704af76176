use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::traits::RenderBackend;

const BUILTIN_VERTEX: &str = include_str!("shaders/model_vertex.wgsl");
const BUILTIN_FRAGMENT: &str = include_str!("shaders/model_fragment.wgsl");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("failed to read shader source {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} shader failed to compile: {log}")]
    Compile { stage: ShaderStage, log: String },

    #[error("shader program failed to link: {log}")]
    Link { log: String },
}

/// Vertex and fragment stage sources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    pub vertex: String,
    pub fragment: String,
}

impl ShaderSource {
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }

    /// Textured-model shader shipped with the crate
    pub fn builtin() -> Self {
        Self::new(BUILTIN_VERTEX, BUILTIN_FRAGMENT)
    }

    pub fn from_files(vertex: impl AsRef<Path>, fragment: impl AsRef<Path>) -> Result<Self, ShaderError> {
        Ok(Self::new(read_source(vertex.as_ref())?, read_source(fragment.as_ref())?))
    }

    pub fn source(&self, stage: ShaderStage) -> &str {
        match stage {
            ShaderStage::Vertex => &self.vertex,
            ShaderStage::Fragment => &self.fragment,
        }
    }
}

fn read_source(path: &Path) -> Result<String, ShaderError> {
    std::fs::read_to_string(path).map_err(|source| ShaderError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Compile `source`, falling back to the built-in shader when it fails
///
/// The fallback itself failing is returned as an error.
pub fn compile_or_builtin<B: RenderBackend>(
    backend: &mut B,
    source: Result<ShaderSource, ShaderError>,
) -> Result<B::Program, ShaderError> {
    let attempt = source.and_then(|source| backend.compile_program(&source));
    match attempt {
        Ok(program) => Ok(program),
        Err(e) => {
            log::warn!("{e}; falling back to the built-in shader");
            backend.compile_program(&ShaderSource::builtin())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_declares_entry_points() {
        let builtin = ShaderSource::builtin();
        assert!(builtin.vertex.contains("fn vs_main"));
        assert!(builtin.fragment.contains("fn fs_main"));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = ShaderSource::from_files("missing/model.vert.wgsl", "missing/model.frag.wgsl")
            .unwrap_err();
        match err {
            ShaderError::Read { path, .. } => {
                assert_eq!(path, PathBuf::from("missing/model.vert.wgsl"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_stage_accessor() {
        let source = ShaderSource::new("v", "f");
        assert_eq!(source.source(ShaderStage::Vertex), "v");
        assert_eq!(source.source(ShaderStage::Fragment), "f");
    }

    #[test]
    fn test_error_messages_name_stage() {
        let err = ShaderError::Compile { stage: ShaderStage::Fragment, log: "bad token".into() };
        assert_eq!(err.to_string(), "fragment shader failed to compile: bad token");
    }
}
