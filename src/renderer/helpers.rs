use glam::{Vec2, Vec3};

use crate::mesh::{Mesh, MeshVertex};

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

impl LineVertex {
    pub fn layout<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<LineVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute { offset: 0, shader_location: 0, format: wgpu::VertexFormat::Float32x3 },
                wgpu::VertexAttribute { offset: 12, shader_location: 1, format: wgpu::VertexFormat::Float32x3 },
            ],
        }
    }
}

/// Ground quad on the XZ plane, centred on the origin, facing +Y.
pub fn floor_mesh(size: f32) -> Mesh {
    let h = size.max(0.0) * 0.5;
    let corners = [
        (Vec3::new(-h, 0.0, -h), Vec2::new(0.0, 0.0)),
        (Vec3::new(-h, 0.0, h), Vec2::new(0.0, 1.0)),
        (Vec3::new(h, 0.0, h), Vec2::new(1.0, 1.0)),
        (Vec3::new(h, 0.0, -h), Vec2::new(1.0, 0.0)),
    ];
    let vertices = corners.iter().map(|(pos, uv)| MeshVertex::new(*pos, Vec3::Y, *uv)).collect();
    Mesh::new(vertices, vec![0, 1, 2, 0, 2, 3]).with_name("floor")
}

/// Unit-length X, Y and Z axes in red, green and blue.
pub fn axes_lines(length: f32) -> Vec<LineVertex> {
    [(Vec3::X, [1.0, 0.0, 0.0]), (Vec3::Y, [0.0, 1.0, 0.0]), (Vec3::Z, [0.0, 0.0, 1.0])]
        .iter()
        .flat_map(|(axis, color)| {
            [
                LineVertex { position: [0.0; 3], color: *color },
                LineVertex { position: (*axis * length).to_array(), color: *color },
            ]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_winding_faces_up() {
        let floor = floor_mesh(20.0);
        let p = |i: u32| Vec3::from_array(floor.vertices[i as usize].position);
        for tri in floor.indices.chunks_exact(3) {
            let normal = (p(tri[1]) - p(tri[0])).cross(p(tri[2]) - p(tri[0]));
            assert!(normal.y > 0.0);
        }
        assert!((floor.bounds.max.x - 10.0).abs() < 1e-5);
    }

    #[test]
    fn axes_are_three_segments() {
        let lines = axes_lines(2.0);
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[3].position, [0.0, 2.0, 0.0]);
    }
}
