use std::collections::HashMap;
use std::path::Path;

use glam::{Mat4, Vec2, Vec3};
use gltf::mesh::Mode;

use super::{ImportError, ImportFlags};
use crate::scene::{Face, MaterialSlot, NodeId, RawMaterial, RawMesh, SceneGraph, SceneNode};
use crate::texture::{TextureKind, TextureSource};
use crate::traits::SceneImporter;

/// glTF 2.0 importer (`.gltf` with external or embedded buffers, `.glb`)
///
/// Every primitive becomes its own raw mesh; a synthetic root node parents
/// the root nodes of the default scene. Node hierarchies with cycles or
/// shared children are rejected.
///
/// Reads with `Gltf::open` plus `import_buffers` rather than `gltf::import`,
/// which would also decode every image; images are decoded later by the
/// texture loader, so image URIs are percent-decoded here.
#[derive(Debug, Clone, Copy, Default)]
pub struct GltfImporter;

impl SceneImporter for GltfImporter {
    fn import(&self, path: &Path, flags: ImportFlags) -> Result<SceneGraph, ImportError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("gltf") || ext.eq_ignore_ascii_case("glb") => {}
            _ => return Err(ImportError::UnsupportedFormat(path.to_path_buf())),
        }

        log::info!("Loading glTF file: {:?}", path);

        let gltf_error = |source| ImportError::Gltf {
            path: path.to_path_buf(),
            source,
        };
        let gltf::Gltf { document, blob } = gltf::Gltf::open(path).map_err(gltf_error)?;
        let buffers = gltf::import_buffers(&document, path.parent(), blob).map_err(gltf_error)?;

        log::info!(
            "glTF parsed: {} scenes, {} nodes, {} meshes, {} materials, {} images",
            document.scenes().count(),
            document.nodes().count(),
            document.meshes().count(),
            document.materials().count(),
            document.images().count()
        );

        let graph = build_graph(&document, &buffers, flags);
        if let Some(node) = graph.shared_node() {
            return Err(ImportError::NotATree {
                path: path.to_path_buf(),
                node: node.0,
            });
        }
        Ok(graph)
    }
}

fn build_graph(document: &gltf::Document, buffers: &[gltf::buffer::Data], flags: ImportFlags) -> SceneGraph {
    let mut graph = SceneGraph {
        materials: document
            .materials()
            .map(|material| convert_material(&material, buffers))
            .collect(),
        ..SceneGraph::default()
    };

    // glTF mesh index -> raw meshes, one per primitive
    let mut primitives: HashMap<usize, Vec<usize>> = HashMap::new();
    for mesh in document.meshes() {
        for primitive in mesh.primitives() {
            let Some(raw) = convert_primitive(&mesh, &primitive, buffers, flags) else {
                continue;
            };
            graph.meshes.push(raw);
            primitives
                .entry(mesh.index())
                .or_default()
                .push(graph.meshes.len() - 1);
        }
    }

    // node ids match glTF node indices
    for node in document.nodes() {
        graph.nodes.push(SceneNode {
            name: node.name().map(str::to_string),
            transform: Mat4::from_cols_array_2d(&node.transform().matrix()),
            meshes: node
                .mesh()
                .and_then(|mesh| primitives.get(&mesh.index()).cloned())
                .unwrap_or_default(),
            children: node.children().map(|child| NodeId(child.index())).collect(),
        });
    }

    let scene = document.default_scene().or_else(|| document.scenes().next());
    if let Some(scene) = scene {
        let root = SceneNode {
            name: scene.name().map(str::to_string),
            children: scene.nodes().map(|node| NodeId(node.index())).collect(),
            ..SceneNode::default()
        };
        graph.root = Some(graph.add_node(root));
    }

    graph.incomplete = graph.meshes.is_empty();
    graph
}

fn convert_primitive(
    mesh: &gltf::Mesh,
    primitive: &gltf::Primitive,
    buffers: &[gltf::buffer::Data],
    flags: ImportFlags,
) -> Option<RawMesh> {
    let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

    let Some(positions) = reader.read_positions() else {
        log::warn!("Skipping primitive without positions in mesh {:?}", mesh.name());
        return None;
    };
    let positions: Vec<Vec3> = positions.map(Vec3::from_array).collect();

    let normals = match reader.read_normals() {
        Some(normals) => normals.map(Vec3::from_array).collect(),
        None => {
            log::debug!("Mesh {:?} has no normals", mesh.name());
            vec![Vec3::ZERO; positions.len()]
        }
    };

    let tex_coords = reader.read_tex_coords(0).map(|coords| {
        coords
            .into_f32()
            .map(|[u, v]| if flags.flip_uvs { Vec2::new(u, v) } else { Vec2::new(u, 1.0 - v) })
            .collect()
    });

    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..positions.len() as u32).collect(),
    };

    let Some(faces) = faces_for_mode(primitive.mode(), &indices, flags.triangulate) else {
        log::debug!("Skipping {:?} primitive in mesh {:?}", primitive.mode(), mesh.name());
        return None;
    };

    Some(RawMesh {
        name: mesh.name().map(str::to_string),
        positions,
        normals,
        tex_coords,
        faces,
        material: primitive.material().index(),
    })
}

/// Splits an index list into faces; `None` for point and line primitives
fn faces_for_mode(mode: Mode, indices: &[u32], triangulate: bool) -> Option<Vec<Face>> {
    let faces = match mode {
        Mode::Triangles => indices
            .chunks_exact(3)
            .map(|tri| Face::triangle(tri[0], tri[1], tri[2]))
            .collect(),
        Mode::TriangleStrip if triangulate => indices
            .windows(3)
            .enumerate()
            .map(|(i, w)| {
                // keep winding consistent on odd triangles
                if i % 2 == 0 {
                    Face::triangle(w[0], w[1], w[2])
                } else {
                    Face::triangle(w[1], w[0], w[2])
                }
            })
            .collect(),
        Mode::TriangleFan if triangulate => match indices.split_first() {
            Some((&center, rest)) => rest
                .windows(2)
                .map(|w| Face::triangle(center, w[0], w[1]))
                .collect(),
            None => Vec::new(),
        },
        Mode::TriangleStrip | Mode::TriangleFan => vec![Face {
            indices: indices.to_vec(),
        }],
        Mode::Points | Mode::Lines | Mode::LineLoop | Mode::LineStrip => return None,
    };
    Some(faces)
}

fn convert_material(material: &gltf::Material, buffers: &[gltf::buffer::Data]) -> RawMaterial {
    let mut slots = Vec::new();
    let mut push = |kind: TextureKind, texture: gltf::Texture| {
        if let Some(source) = texture_source(&texture.source(), buffers) {
            slots.push(MaterialSlot { kind, source });
        }
    };

    if let Some(info) = material.pbr_metallic_roughness().base_color_texture() {
        push(TextureKind::Diffuse, info.texture());
    }
    if let Some(info) = material.specular().and_then(|specular| specular.specular_texture()) {
        push(TextureKind::Specular, info.texture());
    }
    if let Some(normal) = material.normal_texture() {
        push(TextureKind::Normal, normal.texture());
    }

    RawMaterial {
        name: material.name().map(str::to_string),
        slots,
    }
}

fn texture_source(image: &gltf::Image, buffers: &[gltf::buffer::Data]) -> Option<TextureSource> {
    match image.source() {
        gltf::image::Source::Uri { uri, .. } if uri.starts_with("data:") => {
            log::warn!("Data URI image {} is not supported, slot ignored", image.index());
            None
        }
        gltf::image::Source::Uri { uri, .. } => Some(TextureSource::file(percent_decode(uri))),
        gltf::image::Source::View { view, .. } => {
            let start = view.offset();
            let bytes = buffers
                .get(view.buffer().index())
                .and_then(|data| data.get(start..start + view.length()));
            match bytes {
                Some(bytes) => Some(TextureSource::Embedded {
                    key: format!("#image{}", image.index()),
                    bytes: bytes.to_vec(),
                }),
                None => {
                    log::warn!("Image {} points outside its buffer", image.index());
                    None
                }
            }
        }
    }
}

/// Decodes `%XX` escapes in a relative URI
fn percent_decode(uri: &str) -> String {
    let bytes = uri.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let escaped = (bytes[i] == b'%')
            .then(|| uri.get(i + 1..i + 3))
            .flatten()
            .and_then(|hex| u8::from_str_radix(hex, 16).ok());
        match escaped {
            Some(byte) => {
                decoded.push(byte);
                i += 3;
            }
            None => {
                decoded.push(bytes[i]);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(faces: &[Face]) -> Vec<Vec<u32>> {
        faces.iter().map(|f| f.indices.clone()).collect()
    }

    #[test]
    fn test_triangle_list_faces() {
        let faces = faces_for_mode(Mode::Triangles, &[0, 1, 2, 2, 1, 3], true).unwrap();
        assert_eq!(flat(&faces), vec![vec![0, 1, 2], vec![2, 1, 3]]);
    }

    #[test]
    fn test_strip_triangulation_keeps_winding() {
        let faces = faces_for_mode(Mode::TriangleStrip, &[0, 1, 2, 3], true).unwrap();
        assert_eq!(flat(&faces), vec![vec![0, 1, 2], vec![2, 1, 3]]);
    }

    #[test]
    fn test_fan_triangulation() {
        let faces = faces_for_mode(Mode::TriangleFan, &[0, 1, 2, 3], true).unwrap();
        assert_eq!(flat(&faces), vec![vec![0, 1, 2], vec![0, 2, 3]]);
    }

    #[test]
    fn test_fan_without_triangulation_is_one_face() {
        let faces = faces_for_mode(Mode::TriangleFan, &[0, 1, 2, 3], false).unwrap();
        assert_eq!(flat(&faces), vec![vec![0, 1, 2, 3]]);
    }

    #[test]
    fn test_lines_are_skipped() {
        assert!(faces_for_mode(Mode::Lines, &[0, 1], true).is_none());
        assert!(faces_for_mode(Mode::Points, &[0], true).is_none());
    }

    #[test]
    fn test_percent_decode() {
        assert_eq!(percent_decode("my%20texture.png"), "my texture.png");
        assert_eq!(percent_decode("plain.png"), "plain.png");
        assert_eq!(percent_decode("bad%zz.png"), "bad%zz.png");
        assert_eq!(percent_decode("tail%2"), "tail%2");
    }

    #[test]
    fn test_rejects_unknown_extension() {
        let result = GltfImporter.import(Path::new("model.obj"), ImportFlags::default());
        assert!(matches!(result, Err(ImportError::UnsupportedFormat(_))));
    }
}
