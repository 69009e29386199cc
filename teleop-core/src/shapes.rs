//! Procedural point cloud shape generators
//!
//! Each generator produces a [`ColoredPointCloud3f`] with per-point colors.
//! The color formulas differ per shape on purpose; downstream visuals depend
//! on the exact mappings, so they are kept as-is rather than unified.

use crate::point::{ColoredPoint3f, Point3f};
use crate::point_cloud::ColoredPointCloud3f;
use std::f32::consts::PI;

/// Half-extent of the cube lattice and radius of the sphere/circle shapes
pub const SHAPE_SIZE: f32 = 5.0;

const CUBE_DIVISIONS: f32 = 10.0;
const CUBE_SPACING: f32 = 1.2;

const SPHERE_SEGMENTS: usize = 32;
const SPHERE_RINGS: usize = 32;

const CIRCLE_SEGMENTS: usize = 200;

/// The point cloud shapes the viewer can display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Cube,
    Sphere,
    Circle,
}

impl Shape {
    /// Build the point cloud for this shape
    pub fn generate(&self) -> ColoredPointCloud3f {
        match self {
            Shape::Cube => generate_cube(),
            Shape::Sphere => generate_sphere(),
            Shape::Circle => generate_circle(),
        }
    }
}

/// A regular lattice over `[-5, 5]^3`, colored by normalized position per axis
pub fn generate_cube() -> ColoredPointCloud3f {
    let size = SHAPE_SIZE;
    let step = (size / CUBE_DIVISIONS) * CUBE_SPACING;
    let mut cloud = ColoredPointCloud3f::new();

    let mut x = -size;
    while x <= size {
        let mut y = -size;
        while y <= size {
            let mut z = -size;
            while z <= size {
                cloud.push(ColoredPoint3f::new(
                    Point3f::new(x, y, z),
                    [
                        (x + size) / (2.0 * size),
                        (y + size) / (2.0 * size),
                        (z + size) / (2.0 * size),
                    ],
                ));
                z += step;
            }
            y += step;
        }
        x += step;
    }

    cloud
}

/// A radius-5 UV sphere surface, two-tone colored by the sign of y
pub fn generate_sphere() -> ColoredPointCloud3f {
    let radius = SHAPE_SIZE;
    let mut cloud =
        ColoredPointCloud3f::with_capacity((SPHERE_RINGS + 1) * (SPHERE_SEGMENTS + 1));

    for iy in 0..=SPHERE_RINGS {
        let v = iy as f32 / SPHERE_RINGS as f32;
        let phi = v * PI;
        for ix in 0..=SPHERE_SEGMENTS {
            let u = ix as f32 / SPHERE_SEGMENTS as f32;
            let theta = u * 2.0 * PI;

            let x = -radius * theta.cos() * phi.sin();
            let y = radius * phi.cos();
            let z = radius * theta.sin() * phi.sin();

            let color = if y > 0.0 {
                [1.0, 0.0, 0.5]
            } else {
                [0.0, 1.0, 0.5]
            };
            cloud.push(ColoredPoint3f::new(Point3f::new(x, y, z), color));
        }
    }

    cloud
}

/// 200 points evenly spaced on a radius-5 ring in the z = 0 plane,
/// colored from the angular position via sine/cosine mapping
pub fn generate_circle() -> ColoredPointCloud3f {
    let radius = SHAPE_SIZE;
    let mut cloud = ColoredPointCloud3f::with_capacity(CIRCLE_SEGMENTS);

    for i in 0..CIRCLE_SEGMENTS {
        let theta = (i as f32 / CIRCLE_SEGMENTS as f32) * 2.0 * PI;
        cloud.push(ColoredPoint3f::new(
            Point3f::new(theta.cos() * radius, theta.sin() * radius, 0.0),
            [theta.sin() * 0.5 + 0.5, theta.cos() * 0.5 + 0.5, 0.5],
        ));
    }

    cloud
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn cube_lattice_count_and_colors() {
        let cloud = generate_cube();

        // 17 lattice steps per axis: -5.0, -4.4, ... 4.6
        let per_axis = 17;
        assert_eq!(cloud.len(), per_axis * per_axis * per_axis);

        for point in cloud.iter() {
            for channel in point.color {
                assert!((0.0..=1.0).contains(&channel), "channel {} out of range", channel);
            }
        }
    }

    #[test]
    fn cube_color_tracks_position() {
        let cloud = generate_cube();
        let corner = cloud
            .iter()
            .find(|p| p.position == Point3f::new(-5.0, -5.0, -5.0))
            .expect("lattice contains the min corner");
        assert_eq!(corner.color, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn sphere_two_tone_split() {
        let cloud = generate_sphere();
        assert_eq!(cloud.len(), 33 * 33);

        for point in cloud.iter() {
            if point.position.y > 0.0 {
                assert_eq!(point.color[0], 1.0);
                assert_eq!(point.color[1], 0.0);
            } else {
                assert_eq!(point.color[0], 0.0);
                assert_eq!(point.color[1], 1.0);
            }
            assert_eq!(point.color[2], 0.5);
        }
    }

    #[test]
    fn sphere_points_on_surface() {
        let cloud = generate_sphere();
        for point in cloud.iter() {
            let norm = point.position.coords.norm();
            assert_relative_eq!(norm, SHAPE_SIZE, epsilon = 1e-3);
        }
    }

    #[test]
    fn circle_ring_in_plane() {
        let cloud = generate_circle();
        assert_eq!(cloud.len(), 200);

        for point in cloud.iter() {
            assert_eq!(point.position.z, 0.0);
            let r2 = point.position.x * point.position.x + point.position.y * point.position.y;
            assert_relative_eq!(r2, 25.0, epsilon = 1e-3);
        }
    }
}
