use std::path::Path;

use crate::loaders::{ImportError, ImportFlags};
use crate::scene::SceneGraph;

/// External scene-file parser
pub trait SceneImporter {
    /// Parse `path` into a node tree of geometry and material references
    fn import(&self, path: &Path, flags: ImportFlags) -> Result<SceneGraph, ImportError>;
}
