pub mod material;

pub use material::{
    BasicMaterial, Material, StandardMaterial, TextureBinding, TextureHandle, WrapMode,
};

use glam::Vec3;
use std::fmt;

/// Stable handle to one renderable part of the loaded model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub u32);

impl fmt::Display for MeshId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mesh-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Bounds {
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a [f32; 3]>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        let mut bounds = Self {
            min: first,
            max: first,
        };
        for point in iter {
            for axis in 0..3 {
                bounds.min[axis] = bounds.min[axis].min(point[axis]);
                bounds.max[axis] = bounds.max[axis].max(point[axis]);
            }
        }
        Some(bounds)
    }

    pub fn union(self, other: Self) -> Self {
        Self {
            min: [
                self.min[0].min(other.min[0]),
                self.min[1].min(other.min[1]),
                self.min[2].min(other.min[2]),
            ],
            max: [
                self.max[0].max(other.max[0]),
                self.max[1].max(other.max[1]),
                self.max[2].max(other.max[2]),
            ],
        }
    }

    pub fn center(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }

    /// Half size along each axis.
    pub fn extent(&self) -> [f32; 3] {
        [
            (self.max[0] - self.min[0]) * 0.5,
            (self.max[1] - self.min[1]) * 0.5,
            (self.max[2] - self.min[2]) * 0.5,
        ]
    }
}

/// Triangle list in world space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshGeometry {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl MeshGeometry {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(&self.positions)
    }

    /// Triangles with out-of-range indices are skipped.
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).filter_map(|tri| {
            let a = self.positions.get(tri[0] as usize)?;
            let b = self.positions.get(tri[1] as usize)?;
            let c = self.positions.get(tri[2] as usize)?;
            Some([Vec3::from(*a), Vec3::from(*b), Vec3::from(*c)])
        })
    }
}

#[derive(Debug, Clone)]
pub struct MeshNode {
    pub id: MeshId,
    pub name: String,
    pub base_material: Material,
    pub geometry: MeshGeometry,
    pub bounds: Option<Bounds>,
    material: StandardMaterial,
    material_revision: u64,
}

impl MeshNode {
    pub fn new(id: MeshId, name: String, base_material: Material, geometry: MeshGeometry) -> Self {
        let material = base_material.to_standard();
        let bounds = geometry.bounds();
        Self {
            id,
            name,
            base_material,
            geometry,
            bounds,
            material,
            material_revision: 0,
        }
    }

    /// Material currently drawn for this mesh.
    pub fn material(&self) -> &StandardMaterial {
        &self.material
    }

    /// Bumped whenever the drawn material changes.
    pub fn material_revision(&self) -> u64 {
        self.material_revision
    }

    pub fn material_name(&self) -> &str {
        self.base_material.name()
    }

    /// Returns true if the drawn material changed.
    pub fn set_material(&mut self, resolved: StandardMaterial) -> bool {
        if resolved == self.material {
            return false;
        }
        self.material = resolved;
        self.material_revision += 1;
        true
    }
}

/// Transform-only node of the source file. Its transform is already baked
/// into the world-space geometry of the meshes below it.
#[derive(Debug, Clone, Default)]
pub struct GroupNode {
    pub children: Vec<SceneNode>,
}

#[derive(Debug, Clone)]
pub enum SceneNode {
    Group(GroupNode),
    Mesh(MeshNode),
}

#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    pub name: String,
    roots: Vec<SceneNode>,
    next_mesh_id: u32,
}

impl SceneGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            roots: Vec::new(),
            next_mesh_id: 0,
        }
    }

    pub fn allocate_mesh_id(&mut self) -> MeshId {
        let id = MeshId(self.next_mesh_id);
        self.next_mesh_id += 1;
        id
    }

    pub fn push_root(&mut self, node: SceneNode) {
        self.roots.push(node);
    }

    pub fn visit_meshes<F>(&self, mut visit: F)
    where
        F: FnMut(&MeshNode),
    {
        for node in &self.roots {
            visit_node(node, &mut visit);
        }
    }

    pub fn visit_meshes_mut<F>(&mut self, mut visit: F)
    where
        F: FnMut(&mut MeshNode),
    {
        for node in &mut self.roots {
            visit_node_mut(node, &mut visit);
        }
    }

    pub fn meshes(&self) -> Vec<&MeshNode> {
        let mut meshes = Vec::new();
        for node in &self.roots {
            collect_meshes(node, &mut meshes);
        }
        meshes
    }

    pub fn mesh(&self, id: MeshId) -> Option<&MeshNode> {
        self.meshes().into_iter().find(|mesh| mesh.id == id)
    }

    pub fn mesh_count(&self) -> usize {
        let mut count = 0;
        self.visit_meshes(|_| count += 1);
        count
    }

    pub fn bounds(&self) -> Option<Bounds> {
        let mut bounds: Option<Bounds> = None;
        self.visit_meshes(|mesh| {
            if let Some(mesh_bounds) = mesh.bounds {
                bounds = Some(match bounds {
                    Some(current) => current.union(mesh_bounds),
                    None => mesh_bounds,
                });
            }
        });
        bounds
    }
}

fn visit_node<F>(node: &SceneNode, visit: &mut F)
where
    F: FnMut(&MeshNode),
{
    match node {
        SceneNode::Mesh(mesh) => visit(mesh),
        SceneNode::Group(group) => {
            for child in &group.children {
                visit_node(child, visit);
            }
        }
    }
}

fn visit_node_mut<F>(node: &mut SceneNode, visit: &mut F)
where
    F: FnMut(&mut MeshNode),
{
    match node {
        SceneNode::Mesh(mesh) => visit(mesh),
        SceneNode::Group(group) => {
            for child in &mut group.children {
                visit_node_mut(child, visit);
            }
        }
    }
}

fn collect_meshes<'a>(node: &'a SceneNode, out: &mut Vec<&'a MeshNode>) {
    match node {
        SceneNode::Mesh(mesh) => out.push(mesh),
        SceneNode::Group(group) => {
            for child in &group.children {
                collect_meshes(child, out);
            }
        }
    }
}
