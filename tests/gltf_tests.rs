use std::path::{Path, PathBuf};

use model_viewer::core::RecordingBackend;
use model_viewer::loaders::{GltfImporter, ImportError, ImportFlags};
use model_viewer::model::{LoadError, LoadOptions, Model};
use model_viewer::scene::NodeId;
use model_viewer::texture::{TextureKind, TextureSource};
use model_viewer::traits::SceneImporter;
use serde_json::json;

fn fixture_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("model_viewer_gltf_{}_{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Triangle positions, u16 indices (padded to 4 bytes), then UVs
fn triangle_buffer() -> Vec<u8> {
    let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
    let indices: [u16; 4] = [0, 1, 2, 0];
    let uvs: [f32; 6] = [0.0, 0.0, 1.0, 0.0, 0.0, 0.25];

    let mut bytes = Vec::new();
    bytes.extend(positions.iter().flat_map(|f| f.to_le_bytes()));
    bytes.extend(indices.iter().flat_map(|i| i.to_le_bytes()));
    bytes.extend(uvs.iter().flat_map(|f| f.to_le_bytes()));
    bytes
}

/// Parent node with the triangle, child node lifted by 2 on Y sharing the same mesh
fn write_scene(dir: &Path, with_scene: bool, with_mesh: bool) -> PathBuf {
    let buffer = triangle_buffer();
    std::fs::write(dir.join("tri.bin"), &buffer).unwrap();

    let mut document = json!({
        "asset": { "version": "2.0" },
        "nodes": [
            { "name": "parent", "children": [1] },
            { "name": "child", "translation": [0.0, 2.0, 0.0] }
        ],
        "materials": [
            { "pbrMetallicRoughness": { "baseColorTexture": { "index": 0 } } }
        ],
        "textures": [{ "source": 0 }],
        "images": [{ "uri": "my%20tex.png" }],
        "buffers": [{ "uri": "tri.bin", "byteLength": buffer.len() }],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 6 },
            { "buffer": 0, "byteOffset": 44, "byteLength": 24 }
        ],
        "accessors": [
            {
                "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
            },
            { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" },
            { "bufferView": 2, "componentType": 5126, "count": 3, "type": "VEC2" }
        ]
    });

    if with_mesh {
        document["meshes"] = json!([{
            "name": "tri",
            "primitives": [{
                "attributes": { "POSITION": 0, "TEXCOORD_0": 2 },
                "indices": 1,
                "material": 0
            }]
        }]);
        document["nodes"][0]["mesh"] = json!(0);
        document["nodes"][1]["mesh"] = json!(0);
    }
    if with_scene {
        document["scene"] = json!(0);
        document["scenes"] = json!([{ "nodes": [0] }]);
    }

    let path = dir.join("scene.gltf");
    std::fs::write(&path, serde_json::to_string_pretty(&document).unwrap()).unwrap();
    path
}

#[cfg(test)]
mod gltf_tests {
    use super::*;

    #[test]
    fn test_import_builds_graph_with_synthetic_root() {
        let path = write_scene(&fixture_dir("graph"), true, true);
        let graph = GltfImporter.import(&path, ImportFlags::default()).unwrap();

        assert!(!graph.incomplete);
        assert_eq!(graph.meshes.len(), 1);
        assert_eq!(graph.nodes.len(), 3);

        let root = graph.node(graph.root.unwrap()).unwrap();
        assert_eq!(root.children, vec![NodeId(0)]);
        assert_eq!(graph.nodes[0].children, vec![NodeId(1)]);
        assert_eq!(graph.nodes[1].meshes, vec![0]);

        let mesh = &graph.meshes[0];
        assert_eq!(mesh.positions.len(), 3);
        assert_eq!(mesh.faces.len(), 1);
        assert_eq!(mesh.faces[0].indices, vec![0, 1, 2]);
        assert_eq!(mesh.material, Some(0));
    }

    #[test]
    fn test_material_uri_is_percent_decoded() {
        let path = write_scene(&fixture_dir("material"), true, true);
        let graph = GltfImporter.import(&path, ImportFlags::default()).unwrap();

        let material = &graph.materials[0];
        let diffuse: Vec<_> = material.textures(&TextureKind::Diffuse).collect();
        assert_eq!(diffuse, vec![&TextureSource::file("my tex.png")]);
        assert_eq!(material.texture_count(&TextureKind::Specular), 0);
    }

    #[test]
    fn test_uv_origin_follows_flag() {
        let path = write_scene(&fixture_dir("uvs"), true, true);

        let top_left = GltfImporter.import(&path, ImportFlags::default()).unwrap();
        let uvs = top_left.meshes[0].tex_coords.clone().unwrap();
        assert_eq!(uvs[2].y, 0.25);

        let flags = ImportFlags {
            flip_uvs: false,
            ..ImportFlags::default()
        };
        let bottom_left = GltfImporter.import(&path, flags).unwrap();
        let uvs = bottom_left.meshes[0].tex_coords.clone().unwrap();
        assert_eq!(uvs[2].y, 0.75);
    }

    #[test]
    fn test_missing_normals_default_to_zero() {
        let path = write_scene(&fixture_dir("normals"), true, true);
        let graph = GltfImporter.import(&path, ImportFlags::default()).unwrap();
        assert!(graph.meshes[0].normals.iter().all(|n| *n == glam::Vec3::ZERO));
    }

    #[test]
    fn test_load_model_from_gltf() {
        let dir = fixture_dir("load");
        let path = write_scene(&dir, true, true);
        image::RgbaImage::from_pixel(4, 4, image::Rgba([10, 20, 30, 255]))
            .save(dir.join("my tex.png"))
            .unwrap();

        let mut backend = RecordingBackend::new();
        let model = Model::load(&path, &GltfImporter, &mut backend, &LoadOptions::default()).unwrap();

        // one mesh per node occurrence, texture shared
        assert_eq!(model.meshes().len(), 2);
        assert_eq!(backend.upload_count(), 1);
        assert_eq!(model.meshes()[0].vertices()[1].position, [1.0, 0.0, 0.0]);
        assert_eq!(model.meshes()[1].vertices()[1].position, [1.0, 2.0, 0.0]);

        let summary = model.summary();
        assert_eq!(summary.vertices, 6);
        assert_eq!(summary.indices, 6);
        assert_eq!(summary.textures, 1);
        assert_eq!(summary.texture_references, 2);
    }

    #[test]
    fn test_document_without_meshes_is_incomplete() {
        let path = write_scene(&fixture_dir("no_meshes"), true, false);
        let mut backend = RecordingBackend::new();
        let result = Model::load(&path, &GltfImporter, &mut backend, &LoadOptions::default());
        assert!(matches!(result, Err(LoadError::IncompleteScene(_))));
    }

    #[test]
    fn test_document_without_scene_has_no_root() {
        let path = write_scene(&fixture_dir("no_scene"), false, true);
        let graph = GltfImporter.import(&path, ImportFlags::default()).unwrap();
        assert!(graph.root.is_none());

        let mut backend = RecordingBackend::new();
        let result = Model::load(&path, &GltfImporter, &mut backend, &LoadOptions::default());
        assert!(matches!(result, Err(LoadError::MissingRoot(_))));
    }

    #[test]
    fn test_cyclic_node_hierarchy_is_rejected() {
        let dir = fixture_dir("cycle");
        let document = json!({
            "asset": { "version": "2.0" },
            "scene": 0,
            "scenes": [{ "nodes": [0] }],
            "nodes": [
                { "name": "a", "children": [1] },
                { "name": "b", "children": [0] }
            ]
        });
        let path = dir.join("cycle.gltf");
        std::fs::write(&path, serde_json::to_string(&document).unwrap()).unwrap();

        let result = GltfImporter.import(&path, ImportFlags::default());
        assert!(matches!(result, Err(ImportError::NotATree { node: 0, .. })));

        let mut backend = RecordingBackend::new();
        let model = Model::load_or_empty(&path, &GltfImporter, &mut backend, &LoadOptions::default());
        assert!(model.is_empty());
    }

    #[test]
    fn test_missing_file_is_an_import_error() {
        let path = fixture_dir("missing").join("nope.gltf");
        let result = GltfImporter.import(&path, ImportFlags::default());
        assert!(matches!(result, Err(ImportError::Gltf { .. })));

        let mut backend = RecordingBackend::new();
        let model = Model::load_or_empty(&path, &GltfImporter, &mut backend, &LoadOptions::default());
        assert!(model.is_empty());
    }
}
