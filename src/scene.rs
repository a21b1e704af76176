use glam::{Mat4, Vec2, Vec3};

use crate::texture::{TextureKind, TextureSource};

/// Index of a node inside a [`SceneGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// Parsed scene as delivered by a scene importer
///
/// Nodes, meshes and materials live in flat arrays and reference each other by
/// index. The graph is expected to be a tree rooted at `root`.
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    pub nodes: Vec<SceneNode>,
    pub meshes: Vec<RawMesh>,
    pub materials: Vec<RawMaterial>,
    pub root: Option<NodeId>,
    /// Set by the importer when the document could not be fully read
    pub incomplete: bool,
}

#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: Option<String>,
    /// Local transform relative to the parent node
    pub transform: Mat4,
    /// Indices into [`SceneGraph::meshes`]
    pub meshes: Vec<usize>,
    pub children: Vec<NodeId>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            transform: Mat4::IDENTITY,
            meshes: Vec::new(),
            children: Vec::new(),
        }
    }
}

impl Default for SceneNode {
    fn default() -> Self {
        Self {
            name: None,
            transform: Mat4::IDENTITY,
            meshes: Vec::new(),
            children: Vec::new(),
        }
    }
}

/// One face of a raw mesh; three indices once triangulated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Face {
    pub indices: Vec<u32>,
}

impl Face {
    pub fn triangle(a: u32, b: u32, c: u32) -> Self {
        Self {
            indices: vec![a, b, c],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RawMesh {
    pub name: Option<String>,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    /// First UV channel, absent when the source mesh has none
    pub tex_coords: Option<Vec<Vec2>>,
    pub faces: Vec<Face>,
    /// Index into [`SceneGraph::materials`]
    pub material: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialSlot {
    pub kind: TextureKind,
    pub source: TextureSource,
}

#[derive(Debug, Clone, Default)]
pub struct RawMaterial {
    pub name: Option<String>,
    pub slots: Vec<MaterialSlot>,
}

impl RawMaterial {
    /// Texture sources bound to `kind`, in slot order
    pub fn textures<'a>(&'a self, kind: &'a TextureKind) -> impl Iterator<Item = &'a TextureSource> + 'a {
        self.slots
            .iter()
            .filter(move |slot| &slot.kind == kind)
            .map(|slot| &slot.source)
    }

    pub fn texture_count(&self, kind: &TextureKind) -> usize {
        self.textures(kind).count()
    }
}

impl SceneGraph {
    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.0)
    }

    /// Appends a node and returns its id
    pub fn add_node(&mut self, node: SceneNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// First node that breaks the tree shape, if any
    ///
    /// A node listed as a child of more than one parent, listed twice by the
    /// same parent, or the root listed as a child. Without such a node every
    /// walk from the root terminates.
    pub fn shared_node(&self) -> Option<NodeId> {
        let mut parents = vec![0usize; self.nodes.len()];
        let references = self.root.iter().chain(self.nodes.iter().flat_map(|node| &node.children));
        for &id in references {
            if let Some(count) = parents.get_mut(id.0) {
                *count += 1;
                if *count > 1 {
                    return Some(id);
                }
            }
        }
        None
    }

    /// Pre-order depth-first walk from the root, children in declaration order
    ///
    /// Uses an explicit stack so nesting depth never grows the call stack.
    /// Child ids that do not resolve to a node are skipped.
    pub fn depth_first(&self) -> DepthFirst<'_> {
        DepthFirst {
            graph: self,
            stack: self.root.map(|root| vec![(root, Mat4::IDENTITY)]).unwrap_or_default(),
        }
    }
}

/// Iterator over `(node id, node, accumulated world transform)`
pub struct DepthFirst<'a> {
    graph: &'a SceneGraph,
    stack: Vec<(NodeId, Mat4)>,
}

impl<'a> Iterator for DepthFirst<'a> {
    type Item = (NodeId, &'a SceneNode, Mat4);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (id, parent_transform) = self.stack.pop()?;
            let Some(node) = self.graph.node(id) else {
                continue;
            };

            let world = parent_transform * node.transform;
            // reversed so the first child is popped first
            self.stack
                .extend(node.children.iter().rev().map(|&child| (child, world)));

            return Some((id, node, world));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(depth: usize) -> SceneGraph {
        let mut graph = SceneGraph::default();
        let mut parent = graph.add_node(SceneNode::new("root"));
        graph.root = Some(parent);
        for i in 0..depth {
            let child = graph.add_node(SceneNode::new(format!("n{i}")));
            graph.nodes[parent.0].children.push(child);
            parent = child;
        }
        graph
    }

    #[test]
    fn test_empty_graph_yields_nothing() {
        let graph = SceneGraph::default();
        assert_eq!(graph.depth_first().count(), 0);
    }

    #[test]
    fn test_preorder_visits_children_in_order() {
        let mut graph = SceneGraph::default();
        let root = graph.add_node(SceneNode::new("root"));
        let a = graph.add_node(SceneNode::new("a"));
        let b = graph.add_node(SceneNode::new("b"));
        let a1 = graph.add_node(SceneNode::new("a1"));
        graph.nodes[root.0].children = vec![a, b];
        graph.nodes[a.0].children = vec![a1];
        graph.root = Some(root);

        let names: Vec<_> = graph
            .depth_first()
            .filter_map(|(_, node, _)| node.name.clone())
            .collect();
        assert_eq!(names, ["root", "a", "a1", "b"]);
    }

    #[test]
    fn test_tree_has_no_shared_node() {
        let graph = chain(10);
        assert_eq!(graph.shared_node(), None);
        assert_eq!(SceneGraph::default().shared_node(), None);
    }

    #[test]
    fn test_cycle_back_to_root_is_shared() {
        let mut graph = chain(3);
        let last = NodeId(graph.nodes.len() - 1);
        graph.nodes[last.0].children.push(NodeId(0));
        assert_eq!(graph.shared_node(), Some(NodeId(0)));
    }

    #[test]
    fn test_node_with_two_parents_is_shared() {
        let mut graph = SceneGraph::default();
        let root = graph.add_node(SceneNode::new("root"));
        let a = graph.add_node(SceneNode::new("a"));
        let b = graph.add_node(SceneNode::new("b"));
        let leaf = graph.add_node(SceneNode::new("leaf"));
        graph.nodes[root.0].children = vec![a, b];
        graph.nodes[a.0].children = vec![leaf];
        graph.nodes[b.0].children = vec![leaf];
        graph.root = Some(root);
        assert_eq!(graph.shared_node(), Some(leaf));
    }

    #[test]
    fn test_deep_chain_does_not_overflow() {
        let graph = chain(100_000);
        assert_eq!(graph.depth_first().count(), 100_001);
    }

    #[test]
    fn test_transforms_accumulate() {
        let mut graph = chain(2);
        graph.nodes[0].transform = Mat4::from_translation(Vec3::X);
        graph.nodes[2].transform = Mat4::from_scale(Vec3::splat(2.0));

        let last = graph.depth_first().last().map(|(_, _, world)| world);
        let p = last.map(|m| m.transform_point3(Vec3::ONE));
        assert_eq!(p, Some(Vec3::new(3.0, 2.0, 2.0)));
    }

    #[test]
    fn test_dangling_child_is_skipped() {
        let mut graph = chain(1);
        graph.nodes[0].children.push(NodeId(42));
        assert_eq!(graph.depth_first().count(), 2);
    }

    #[test]
    fn test_material_textures_by_kind() {
        let material = RawMaterial {
            name: None,
            slots: vec![
                MaterialSlot { kind: TextureKind::Diffuse, source: TextureSource::file("a.png") },
                MaterialSlot { kind: TextureKind::Specular, source: TextureSource::file("s.png") },
                MaterialSlot { kind: TextureKind::Diffuse, source: TextureSource::file("b.png") },
            ],
        };
        let diffuse: Vec<_> = material.textures(&TextureKind::Diffuse).collect();
        assert_eq!(diffuse, [&TextureSource::file("a.png"), &TextureSource::file("b.png")]);
        assert_eq!(material.texture_count(&TextureKind::Specular), 1);
        assert_eq!(material.texture_count(&TextureKind::Normal), 0);
    }
}
