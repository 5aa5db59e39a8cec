use anyhow::{anyhow, Result};
use glam::{Vec2, Vec3};
use gltf::mesh::Mode;

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub joints: [u16; 4],
    pub weights: [f32; 4],
}

impl MeshVertex {
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            uv: uv.to_array(),
            joints: [0; 4],
            weights: [0.0; 4],
        }
    }

    pub fn with_skin(mut self, joints: [u16; 4], weights: [f32; 4]) -> Self {
        self.joints = joints;
        self.weights = weights;
        self
    }

    pub fn layout<'a>() -> wgpu::VertexBufferLayout<'a> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute { offset: 0, shader_location: 0, format: wgpu::VertexFormat::Float32x3 },
                wgpu::VertexAttribute { offset: 12, shader_location: 1, format: wgpu::VertexFormat::Float32x3 },
                wgpu::VertexAttribute { offset: 24, shader_location: 2, format: wgpu::VertexFormat::Float32x2 },
                wgpu::VertexAttribute { offset: 32, shader_location: 3, format: wgpu::VertexFormat::Uint16x4 },
                wgpu::VertexAttribute { offset: 40, shader_location: 4, format: wgpu::VertexFormat::Float32x4 },
            ],
        }
    }
}

#[derive(Clone, Debug)]
pub struct Mesh {
    pub name: Option<String>,
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
    pub base_color: [f32; 4],
    pub bounds: MeshBounds,
}

#[derive(Clone, Debug)]
pub struct MeshBounds {
    pub min: Vec3,
    pub max: Vec3,
    pub center: Vec3,
    pub radius: f32,
}

impl Mesh {
    pub fn new(vertices: Vec<MeshVertex>, indices: Vec<u32>) -> Self {
        let bounds = MeshBounds::from_vertices(&vertices);
        Self { name: None, vertices, indices, base_color: [1.0; 4], bounds }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn is_skinned(&self) -> bool {
        self.vertices.iter().any(|v| v.weights.iter().any(|w| *w > 0.0))
    }

    /// Flattens every triangle primitive of a glTF mesh into one vertex/index list.
    pub(crate) fn from_gltf(mesh: &gltf::Mesh<'_>, buffers: &[gltf::buffer::Data]) -> Result<Self> {
        let label = mesh.name().map(|s| s.to_string()).unwrap_or_else(|| format!("mesh_{}", mesh.index()));
        let mut vertices: Vec<MeshVertex> = Vec::new();
        let mut indices: Vec<u32> = Vec::new();
        let mut base_color = [1.0; 4];

        for primitive in mesh.primitives() {
            if primitive.mode() != Mode::Triangles {
                log::debug!("mesh '{label}': skipping non-triangle primitive {}", primitive.index());
                continue;
            }
            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));
            let positions: Vec<Vec3> = reader
                .read_positions()
                .ok_or_else(|| anyhow!("POSITION attribute missing in mesh '{label}'"))?
                .map(Vec3::from_array)
                .collect();
            if positions.is_empty() {
                continue;
            }

            let mut normals: Vec<Vec3> = reader
                .read_normals()
                .map(|it| it.map(Vec3::from_array).collect())
                .unwrap_or_default();
            let mut tex_coords: Vec<Vec2> = reader
                .read_tex_coords(0)
                .map(|coords| coords.into_f32().map(Vec2::from_array).collect())
                .unwrap_or_default();
            let mut joints: Vec<[u16; 4]> =
                reader.read_joints(0).map(|it| it.into_u16().collect()).unwrap_or_default();
            let mut weights: Vec<[f32; 4]> =
                reader.read_weights(0).map(|it| it.into_f32().collect()).unwrap_or_default();
            let local_indices: Vec<u32> = reader
                .read_indices()
                .map(|read| read.into_u32().collect())
                .unwrap_or_else(|| (0..positions.len() as u32).collect());

            if normals.len() != positions.len() || normals.iter().all(|n| n.length_squared() == 0.0) {
                normals = compute_normals(&positions, &local_indices);
            }
            tex_coords.resize(positions.len(), Vec2::ZERO);
            joints.resize(positions.len(), [0; 4]);
            weights.resize(positions.len(), [0.0; 4]);

            let base_vertex = vertices.len() as u32;
            vertices.extend(positions.iter().enumerate().map(|(i, pos)| {
                MeshVertex::new(*pos, normals[i].normalize_or_zero(), tex_coords[i])
                    .with_skin(joints[i], weights[i])
            }));
            indices.extend(local_indices.iter().map(|idx| idx + base_vertex));

            base_color = primitive.material().pbr_metallic_roughness().base_color_factor();
        }

        if indices.is_empty() {
            return Err(anyhow!("mesh '{label}' contains no triangle primitives"));
        }
        let mut out = Mesh::new(vertices, indices).with_name(label);
        out.base_color = base_color;
        Ok(out)
    }
}

fn compute_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let (i0, i1, i2) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        if i0 >= positions.len() || i1 >= positions.len() || i2 >= positions.len() {
            continue;
        }
        let normal = (positions[i1] - positions[i0]).cross(positions[i2] - positions[i0]);
        if normal.length_squared() > 0.0 {
            normals[i0] += normal;
            normals[i1] += normal;
            normals[i2] += normal;
        }
    }
    for normal in &mut normals {
        *normal = if normal.length_squared() > 0.0 { normal.normalize() } else { Vec3::Y };
    }
    normals
}

impl MeshBounds {
    pub fn from_vertices(vertices: &[MeshVertex]) -> Self {
        if vertices.is_empty() {
            return MeshBounds { min: Vec3::ZERO, max: Vec3::ZERO, center: Vec3::ZERO, radius: 0.0 };
        }
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for vertex in vertices {
            let pos = Vec3::from_array(vertex.position);
            min = min.min(pos);
            max = max.max(pos);
        }
        let center = (min + max) * 0.5;
        let radius = vertices
            .iter()
            .map(|vertex| (Vec3::from_array(vertex.position) - center).length())
            .fold(0.0_f32, f32::max);
        MeshBounds { min, max, center, radius }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computed_normals_face_out_of_ccw_triangle() {
        let positions = [Vec3::ZERO, Vec3::X, Vec3::Y];
        let normals = compute_normals(&positions, &[0, 1, 2]);
        for n in normals {
            assert!((n - Vec3::Z).length() < 1e-5);
        }
    }

    #[test]
    fn bounds_cover_all_vertices() {
        let vertices = vec![
            MeshVertex::new(Vec3::new(-1.0, 0.0, 0.0), Vec3::Y, Vec2::ZERO),
            MeshVertex::new(Vec3::new(1.0, 2.0, 0.0), Vec3::Y, Vec2::ZERO),
        ];
        let mesh = Mesh::new(vertices, vec![0, 1, 0]);
        assert_eq!(mesh.bounds.center, Vec3::new(0.0, 1.0, 0.0));
        assert!((mesh.bounds.radius - 2.0_f32.sqrt()).abs() < 1e-5);
        assert!(!mesh.is_skinned());
    }
}
