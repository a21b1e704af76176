use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Semantic role of a texture; open set driven by material slot names
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TextureKind {
    Diffuse,
    Specular,
    Normal,
    Other(String),
}

impl TextureKind {
    /// Sampler name stem, e.g. `texture_diffuse`
    pub fn sampler_prefix(&self) -> String {
        match self {
            TextureKind::Diffuse => "texture_diffuse".to_string(),
            TextureKind::Specular => "texture_specular".to_string(),
            TextureKind::Normal => "texture_normal".to_string(),
            TextureKind::Other(name) => format!("texture_{name}"),
        }
    }
}

impl fmt::Display for TextureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextureKind::Diffuse => f.write_str("diffuse"),
            TextureKind::Specular => f.write_str("specular"),
            TextureKind::Normal => f.write_str("normal"),
            TextureKind::Other(name) => f.write_str(name),
        }
    }
}

/// Where a material slot's image comes from
#[derive(Clone, PartialEq, Eq)]
pub enum TextureSource {
    /// Path relative to the model's directory
    File(PathBuf),
    /// Encoded image bytes stored inside the scene file
    Embedded { key: String, bytes: Vec<u8> },
}

impl TextureSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        TextureSource::File(path.into())
    }

    /// Registry key: the resolved path, or the embedded key
    pub fn resolve_key(&self, directory: &Path) -> String {
        match self {
            TextureSource::File(path) => directory.join(path).to_string_lossy().into_owned(),
            TextureSource::Embedded { key, .. } => key.clone(),
        }
    }
}

impl fmt::Debug for TextureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextureSource::File(path) => f.debug_tuple("File").field(path).finish(),
            TextureSource::Embedded { key, bytes } => f
                .debug_struct("Embedded")
                .field("key", key)
                .field("bytes", &bytes.len())
                .finish(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TextureError {
    #[error("failed to decode texture {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
}

/// Decoded RGBA8 image ready for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl TextureImage {
    /// Single magenta pixel standing in for a texture that failed to decode
    pub fn placeholder() -> Self {
        Self::solid([255, 0, 255, 255])
    }

    pub fn solid(rgba: [u8; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: rgba.to_vec(),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TextureError> {
        let path = path.as_ref();
        let decoded = image::open(path).map_err(|source| TextureError::Decode {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::from_rgba(decoded.to_rgba8()))
    }

    pub fn from_memory(key: &str, bytes: &[u8]) -> Result<Self, TextureError> {
        let decoded = image::load_from_memory(bytes).map_err(|source| TextureError::Decode {
            path: key.to_string(),
            source,
        })?;
        Ok(Self::from_rgba(decoded.to_rgba8()))
    }

    /// Decodes a material slot, resolving file paths against `directory`
    pub fn load(source: &TextureSource, directory: &Path) -> Result<Self, TextureError> {
        match source {
            TextureSource::File(path) => Self::from_file(directory.join(path)),
            TextureSource::Embedded { key, bytes } => Self::from_memory(key, bytes),
        }
    }

    fn from_rgba(rgba: image::RgbaImage) -> Self {
        let (width, height) = rgba.dimensions();
        Self {
            width,
            height,
            pixels: rgba.into_raw(),
        }
    }
}

/// Handle into a [`TextureRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(usize);

impl TextureId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A mesh's borrowed reference to a registry texture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureRef {
    pub kind: TextureKind,
    pub id: TextureId,
}

struct TextureEntry<T> {
    key: String,
    handle: T,
}

/// Owning arena of uploaded textures, keyed by resolved path
///
/// Meshes refer to entries by [`TextureId`]; handles are released when the
/// registry is dropped.
pub struct TextureRegistry<T> {
    entries: Vec<TextureEntry<T>>,
    by_key: HashMap<String, TextureId>,
    dedup: bool,
}

impl<T> TextureRegistry<T> {
    pub fn new(dedup: bool) -> Self {
        Self {
            entries: Vec::new(),
            by_key: HashMap::new(),
            dedup,
        }
    }

    pub fn dedup(&self) -> bool {
        self.dedup
    }

    /// Existing entry for `key`; always `None` when deduplication is off
    pub fn lookup(&self, key: &str) -> Option<TextureId> {
        if self.dedup {
            self.by_key.get(key).copied()
        } else {
            None
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, handle: T) -> TextureId {
        let key = key.into();
        let id = TextureId(self.entries.len());
        self.by_key.entry(key.clone()).or_insert(id);
        self.entries.push(TextureEntry { key, handle });
        id
    }

    /// Returns the entry for `key`, calling `upload` only if it is not resident
    pub fn get_or_insert_with<E>(
        &mut self,
        key: &str,
        upload: impl FnOnce() -> Result<T, E>,
    ) -> Result<TextureId, E> {
        if let Some(id) = self.lookup(key) {
            return Ok(id);
        }
        let handle = upload()?;
        Ok(self.insert(key, handle))
    }

    pub fn get(&self, id: TextureId) -> Option<&T> {
        self.entries.get(id.0).map(|entry| &entry.handle)
    }

    pub fn key(&self, id: TextureId) -> Option<&str> {
        self.entries.get(id.0).map(|entry| entry.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> fmt::Debug for TextureRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureRegistry")
            .field("textures", &self.entries.len())
            .field("dedup", &self.dedup)
            .finish()
    }
}
