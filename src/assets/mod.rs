pub mod textures;

pub use textures::{embedded_key, TextureLibrary, TextureState};

use crate::color::LinearRgb;
use crate::customize::TextureLoader;
use crate::resource::{ResourceError, ResourceFetcher, ResourceLocator};
use crate::scene::{
    BasicMaterial, GroupNode, Material, MeshGeometry, MeshNode, SceneGraph, SceneNode,
    StandardMaterial, TextureBinding, WrapMode,
};
use crossbeam_channel::{bounded, Receiver, TryRecvError};
use glam::{Mat3, Mat4, Vec3};
use image::RgbaImage;
use std::path::Path;
use std::thread;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error("failed to import glTF {path}: {source}")]
    Import {
        path: String,
        #[source]
        source: gltf::Error,
    },
    #[error("glTF {path} has no scene")]
    NoScene { path: String },
    #[error("{path} references external files; remote models must be GLB or embed their data")]
    ExternalReference { path: String },
    #[error("failed to start model download: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("download of {path} stopped before finishing")]
    FetchInterrupted { path: String },
}

type Imported = (gltf::Document, Vec<gltf::buffer::Data>, Vec<gltf::image::Data>);

/// Loads a local glTF/GLB file (external buffers resolve next to it) into a
/// scene graph with world-space geometry.
///
/// Embedded base-colour images are registered in `textures` under
/// [`embedded_key`] so base materials can reference them by handle.
pub fn load_model(
    fetcher: &ResourceFetcher,
    path: &Path,
    textures: &mut TextureLibrary,
) -> Result<SceneGraph, AssetError> {
    let resolved = fetcher.resolve_local(path);
    let imported = gltf::import(&resolved).map_err(|source| AssetError::Import {
        path: resolved.display().to_string(),
        source,
    })?;
    finish_import(&ResourceLocator::Local(resolved).display_name(), imported, textures)
}

/// Loads a self-contained model (GLB, or glTF with data URIs) from memory.
pub fn load_model_slice(
    name: &str,
    bytes: &[u8],
    textures: &mut TextureLibrary,
) -> Result<SceneGraph, AssetError> {
    let imported = gltf::import_slice(bytes).map_err(|source| match source {
        gltf::Error::ExternalReferenceInSliceImport => AssetError::ExternalReference {
            path: name.to_string(),
        },
        source => AssetError::Import {
            path: name.to_string(),
            source,
        },
    })?;
    finish_import(name, imported, textures)
}

fn finish_import(
    name: &str,
    (document, buffers, images): Imported,
    textures: &mut TextureLibrary,
) -> Result<SceneGraph, AssetError> {
    for (index, data) in images.iter().enumerate() {
        match rgba_from_gltf_image(data) {
            Some(image) => {
                textures.insert_decoded(&embedded_key(index), image);
            }
            None => log::warn!(
                "Embedded image {} uses unsupported format {:?}",
                index,
                data.format
            ),
        }
    }

    let scene = build_scene(name, &document, &buffers, textures)?;
    let mut triangles = 0;
    scene.visit_meshes(|mesh| triangles += mesh.geometry.triangle_count());
    log::info!(
        "Loaded {}: {} meshes ({} triangles), {} materials, {} embedded images",
        name,
        scene.mesh_count(),
        triangles,
        document.materials().len(),
        images.len()
    );
    Ok(scene)
}

/// Model bytes being fetched on a background thread. Dropping it abandons the
/// download; the worker exits once its result has nowhere to go.
pub struct ModelFetch {
    name: String,
    result_rx: Receiver<Result<Vec<u8>, ResourceError>>,
}

impl ModelFetch {
    pub fn spawn(fetcher: ResourceFetcher, locator: ResourceLocator) -> Result<Self, AssetError> {
        let name = locator.display_name();
        let (result_tx, result_rx) = bounded(1);
        thread::Builder::new()
            .name("model-fetch".into())
            .spawn(move || {
                let _ = result_tx.send(fetcher.fetch(&locator));
            })
            .map_err(AssetError::Spawn)?;
        Ok(Self { name, result_rx })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `None` while the download is still running.
    pub fn poll(&self) -> Option<Result<Vec<u8>, AssetError>> {
        match self.result_rx.try_recv() {
            Ok(result) => Some(result.map_err(AssetError::from)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(AssetError::FetchInterrupted {
                path: self.name.clone(),
            })),
        }
    }
}

pub fn build_scene(
    name: &str,
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
    textures: &mut dyn TextureLoader,
) -> Result<SceneGraph, AssetError> {
    let source_scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| AssetError::NoScene {
            path: name.to_string(),
        })?;

    let mut scene = SceneGraph::new(name);
    let mut builder = SceneBuilder {
        buffers,
        textures: &mut *textures,
        scene: &mut scene,
    };
    let roots: Vec<SceneNode> = source_scene
        .nodes()
        .map(|node| builder.convert_node(&node, Mat4::IDENTITY))
        .collect();
    for root in roots {
        scene.push_root(root);
    }
    Ok(scene)
}

struct SceneBuilder<'a> {
    buffers: &'a [gltf::buffer::Data],
    textures: &'a mut dyn TextureLoader,
    scene: &'a mut SceneGraph,
}

impl SceneBuilder<'_> {
    fn convert_node(&mut self, node: &gltf::Node, parent: Mat4) -> SceneNode {
        let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());
        let name = node
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("node-{}", node.index()));

        let mut children = Vec::new();
        if let Some(mesh) = node.mesh() {
            let primitive_count = mesh.primitives().len();
            for primitive in mesh.primitives() {
                let mesh_name = if primitive_count > 1 {
                    format!("{}#{}", name, primitive.index())
                } else {
                    name.clone()
                };
                if let Some(mesh_node) = self.convert_primitive(mesh_name, &primitive, world) {
                    children.push(SceneNode::Mesh(mesh_node));
                }
            }
        }
        for child in node.children() {
            children.push(self.convert_node(&child, world));
        }

        SceneNode::Group(GroupNode { children })
    }

    fn convert_primitive(
        &mut self,
        name: String,
        primitive: &gltf::Primitive,
        world: Mat4,
    ) -> Option<MeshNode> {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            log::debug!("Skipping {} ({:?} primitive)", name, primitive.mode());
            return None;
        }
        let buffers = self.buffers;
        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));
        let positions: Vec<[f32; 3]> = reader.read_positions()?.collect();
        if positions.is_empty() {
            return None;
        }
        let indices: Vec<u32> = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..positions.len() as u32).collect(),
        };
        let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(Iterator::collect);
        let uvs: Vec<[f32; 2]> = match reader.read_tex_coords(0) {
            Some(coords) => coords.into_f32().collect(),
            None => vec![[0.0, 0.0]; positions.len()],
        };

        let geometry = to_world(positions, normals, uvs, indices, world);
        let material = self.convert_material(&primitive.material());
        let id = self.scene.allocate_mesh_id();
        Some(MeshNode::new(id, name, material, geometry))
    }

    fn convert_material(&mut self, material: &gltf::Material) -> Material {
        let name = match (material.name(), material.index()) {
            (Some(name), _) => name.to_string(),
            (None, Some(index)) => format!("material-{}", index),
            (None, None) => "default".to_string(),
        };
        let pbr = material.pbr_metallic_roughness();
        let [r, g, b, _] = pbr.base_color_factor();
        let color = LinearRgb([r, g, b]);
        let map = pbr.base_color_texture().map(|info| {
            let texture = info.texture();
            let source = embedded_key(texture.source().index());
            TextureBinding {
                handle: self.textures.load(&source),
                source,
                wrap: wrap_mode(texture.sampler().wrap_s()),
                repeat: [1.0, 1.0],
            }
        });

        if material.unlit() {
            Material::Unlit(BasicMaterial { name, color, map })
        } else {
            Material::Standard(StandardMaterial {
                roughness: pbr.roughness_factor(),
                metalness: pbr.metallic_factor(),
                map,
                ..StandardMaterial::new(name, color)
            })
        }
    }
}

/// Bakes `world` into positions and normals. Missing or mismatched normals are
/// recomputed from the triangles.
/// The renderer samples both axes with one mode, so only `wrap_s` is honoured.
fn wrap_mode(mode: gltf::texture::WrappingMode) -> WrapMode {
    match mode {
        gltf::texture::WrappingMode::ClampToEdge => WrapMode::ClampToEdge,
        gltf::texture::WrappingMode::MirroredRepeat => WrapMode::MirroredRepeat,
        gltf::texture::WrappingMode::Repeat => WrapMode::Repeat,
    }
}

pub fn to_world(
    positions: Vec<[f32; 3]>,
    normals: Option<Vec<[f32; 3]>>,
    mut uvs: Vec<[f32; 2]>,
    indices: Vec<u32>,
    world: Mat4,
) -> MeshGeometry {
    let positions: Vec<[f32; 3]> = positions
        .into_iter()
        .map(|p| world.transform_point3(Vec3::from(p)).to_array())
        .collect();

    let normal_matrix = Mat3::from_mat4(world).inverse().transpose();
    let normals = match normals {
        Some(normals) if normals.len() == positions.len() && normal_matrix.is_finite() => normals
            .into_iter()
            .map(|n| {
                (normal_matrix * Vec3::from(n))
                    .try_normalize()
                    .unwrap_or(Vec3::Y)
                    .to_array()
            })
            .collect(),
        _ => vertex_normals(&positions, &indices),
    };
    uvs.resize(positions.len(), [0.0, 0.0]);

    MeshGeometry {
        positions,
        normals,
        uvs,
        indices,
    }
}

/// Area-weighted per-vertex normals.
pub fn vertex_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut accum = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if a >= positions.len() || b >= positions.len() || c >= positions.len() {
            continue;
        }
        let pa = Vec3::from(positions[a]);
        let face = (Vec3::from(positions[b]) - pa).cross(Vec3::from(positions[c]) - pa);
        accum[a] += face;
        accum[b] += face;
        accum[c] += face;
    }
    accum
        .into_iter()
        .map(|n| n.try_normalize().unwrap_or(Vec3::Y).to_array())
        .collect()
}

pub fn rgba_from_gltf_image(data: &gltf::image::Data) -> Option<RgbaImage> {
    use gltf::image::Format;

    let pixels: Vec<u8> = match data.format {
        Format::R8G8B8A8 => data.pixels.clone(),
        Format::R8G8B8 => data
            .pixels
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 255])
            .collect(),
        Format::R8G8 => data
            .pixels
            .chunks_exact(2)
            .flat_map(|p| [p[0], p[0], p[0], p[1]])
            .collect(),
        Format::R8 => data.pixels.iter().flat_map(|&v| [v, v, v, 255]).collect(),
        _ => return None,
    };
    RgbaImage::from_raw(data.width, data.height, pixels)
}
