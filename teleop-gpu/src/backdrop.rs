//! Static backdrop geometry: room shell and ground grid

use bytemuck::{Pod, Zeroable};
use teleop_core::Backdrop;

/// Vertex for unlit line rendering (the grid)
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

impl LineVertex {
    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<LineVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Vertex for the lit room shell
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 3],
}

impl MeshVertex {
    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 6]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Build grid line vertices: `divisions + 1` lines along each axis at y = 0,
/// center lines highlighted with the center color
pub fn grid_vertices(backdrop: &Backdrop) -> Vec<LineVertex> {
    let half = backdrop.grid_size / 2.0;
    let divisions = backdrop.grid_divisions;
    let step = backdrop.grid_size / divisions as f32;
    let center = divisions / 2;

    let mut vertices = Vec::with_capacity(((divisions + 1) * 4) as usize);
    for i in 0..=divisions {
        let offset = -half + i as f32 * step;
        let color = if i == center {
            backdrop.grid_center_color
        } else {
            backdrop.grid_color
        };

        vertices.push(LineVertex {
            position: [offset, 0.0, -half],
            color,
        });
        vertices.push(LineVertex {
            position: [offset, 0.0, half],
            color,
        });
        vertices.push(LineVertex {
            position: [-half, 0.0, offset],
            color,
        });
        vertices.push(LineVertex {
            position: [half, 0.0, offset],
            color,
        });
    }
    vertices
}

/// Build the room shell as a box viewed from the inside: normals point
/// inward so the interior faces are lit
pub fn room_vertices(backdrop: &Backdrop) -> Vec<MeshVertex> {
    let [w, h, d] = backdrop.room_size;
    let (hw, hh, hd) = (w / 2.0, h / 2.0, d / 2.0);
    let color = backdrop.room_color;

    // (inward normal, four corners in fan order)
    let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
        // +X wall, faces -X
        (
            [-1.0, 0.0, 0.0],
            [
                [hw, -hh, -hd],
                [hw, hh, -hd],
                [hw, hh, hd],
                [hw, -hh, hd],
            ],
        ),
        // -X wall, faces +X
        (
            [1.0, 0.0, 0.0],
            [
                [-hw, -hh, hd],
                [-hw, hh, hd],
                [-hw, hh, -hd],
                [-hw, -hh, -hd],
            ],
        ),
        // Ceiling, faces down
        (
            [0.0, -1.0, 0.0],
            [
                [-hw, hh, -hd],
                [-hw, hh, hd],
                [hw, hh, hd],
                [hw, hh, -hd],
            ],
        ),
        // Floor, faces up
        (
            [0.0, 1.0, 0.0],
            [
                [-hw, -hh, hd],
                [-hw, -hh, -hd],
                [hw, -hh, -hd],
                [hw, -hh, hd],
            ],
        ),
        // +Z wall, faces -Z
        (
            [0.0, 0.0, -1.0],
            [
                [-hw, -hh, hd],
                [hw, -hh, hd],
                [hw, hh, hd],
                [-hw, hh, hd],
            ],
        ),
        // -Z wall, faces +Z
        (
            [0.0, 0.0, 1.0],
            [
                [hw, -hh, -hd],
                [-hw, -hh, -hd],
                [-hw, hh, -hd],
                [hw, hh, -hd],
            ],
        ),
    ];

    let mut vertices = Vec::with_capacity(36);
    for (normal, corners) in faces {
        for idx in [0, 1, 2, 0, 2, 3] {
            vertices.push(MeshVertex {
                position: corners[idx],
                normal,
                color,
            });
        }
    }
    vertices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_has_line_pair_per_division() {
        let backdrop = Backdrop::default();
        let vertices = grid_vertices(&backdrop);
        // 21 lines per axis, 2 vertices per line, 2 axes
        assert_eq!(vertices.len(), 21 * 2 * 2);
    }

    #[test]
    fn grid_center_lines_highlighted() {
        let backdrop = Backdrop::default();
        let vertices = grid_vertices(&backdrop);
        let highlighted = vertices
            .iter()
            .filter(|v| v.color == backdrop.grid_center_color)
            .count();
        // One center line per axis
        assert_eq!(highlighted, 4);
    }

    #[test]
    fn room_is_a_closed_box() {
        let vertices = room_vertices(&Backdrop::default());
        assert_eq!(vertices.len(), 36);

        // All corners on the box surface
        for v in &vertices {
            let [x, y, z] = v.position;
            assert!(x.abs() == 15.0 || y.abs() == 10.0 || z.abs() == 15.0);
        }
    }
}
