//! Geometry and per-frame uniform data for the rotating triangle

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
}

/// The triangle, in clip space.
pub const TRIANGLE_VERTICES: [Vertex; 3] = [
    Vertex {
        position: [1.0, 1.0, 0.0],
    },
    Vertex {
        position: [-1.0, 1.0, 0.0],
    },
    Vertex {
        position: [0.0, -1.0, 0.0],
    },
];

/// Uniform block read by the vertex shader at binding 0
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct TriangleUniforms {
    /// Column-major 4x4 transform.
    pub transform: [[f32; 4]; 4],
}

impl TriangleUniforms {
    pub fn at_time(elapsed_secs: f32, aspect_ratio: f32) -> Self {
        Self {
            transform: rotation_matrix(elapsed_secs, aspect_ratio).to_cols_array_2d(),
        }
    }
}

/// Rotation by `time` radians about Z, with X divided by `aspect_ratio` so the
/// triangle keeps its shape on non-square surfaces.
pub fn rotation_matrix(time: f32, aspect_ratio: f32) -> Mat4 {
    let (sin, cos) = time.sin_cos();
    Mat4::from_cols(
        Vec4::new(cos / aspect_ratio, -sin, 0.0, 0.0),
        Vec4::new(sin / aspect_ratio, cos, 0.0, 0.0),
        Vec4::Z,
        Vec4::W,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layouts_match_shader_interface() {
        assert_eq!(std::mem::size_of::<Vertex>(), 12);
        assert_eq!(std::mem::size_of::<TriangleUniforms>(), 64);
        assert_eq!(bytemuck::cast_slice::<Vertex, u8>(&TRIANGLE_VERTICES).len(), 36);
    }

    #[test]
    fn unit_aspect_at_time_zero_is_identity() {
        assert_eq!(rotation_matrix(0.0, 1.0), Mat4::IDENTITY);
    }

    #[test]
    fn aspect_scales_first_row_only() {
        let m = rotation_matrix(0.0, 2.0);
        assert_eq!(m.x_axis, Vec4::new(0.5, 0.0, 0.0, 0.0));
        assert_eq!(m.y_axis, Vec4::new(0.0, 1.0, 0.0, 0.0));
    }

    #[test]
    fn quarter_turn_columns() {
        let m = rotation_matrix(std::f32::consts::FRAC_PI_2, 1.0);
        assert!(m.x_axis.abs_diff_eq(Vec4::new(0.0, -1.0, 0.0, 0.0), 1e-6));
        assert!(m.y_axis.abs_diff_eq(Vec4::new(1.0, 0.0, 0.0, 0.0), 1e-6));
        assert_eq!(m.z_axis, Vec4::Z);
        assert_eq!(m.w_axis, Vec4::W);
    }

    #[test]
    fn uniform_bytes_are_column_major() {
        let uniforms = TriangleUniforms::at_time(0.0, 2.0);
        let floats: &[f32] = bytemuck::cast_slice(bytemuck::bytes_of(&uniforms));
        assert_eq!(&floats[..4], &[0.5, 0.0, 0.0, 0.0]);
        assert_eq!(&floats[12..], &[0.0, 0.0, 0.0, 1.0]);
    }
}
