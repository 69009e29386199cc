//! Scene model: backdrop, lights and the single active point cloud
//!
//! The scene owns at most one point cloud at a time through an explicit
//! single-slot reference. Regenerating a shape replaces the slot contents;
//! there is never a search over scene children to find "the" cloud.

use crate::point_cloud::ColoredPointCloud3f;
use crate::shapes::Shape;
use nalgebra::{Matrix4, UnitQuaternion, Vector3};

/// Per-frame rotation applied to the active cloud by the render loop
pub const IDLE_SPIN: f32 = 0.001;

/// Rotation step applied per arrow keypress, radians
pub const KEY_ROTATE_STEP: f32 = 0.1;

/// Static room-and-grid backdrop parameters
#[derive(Debug, Clone)]
pub struct Backdrop {
    /// Interior room shell dimensions (width, height, depth)
    pub room_size: [f32; 3],
    pub room_color: [f32; 3],
    /// Grid side length in world units
    pub grid_size: f32,
    pub grid_divisions: u32,
    pub grid_center_color: [f32; 3],
    pub grid_color: [f32; 3],
}

impl Default for Backdrop {
    fn default() -> Self {
        Self {
            room_size: [30.0, 20.0, 30.0],
            room_color: [0.25, 0.25, 0.25],
            grid_size: 20.0,
            grid_divisions: 20,
            grid_center_color: [0.53, 0.53, 0.53],
            grid_color: [0.27, 0.27, 0.27],
        }
    }
}

/// Ambient plus directional light parameters fed to the room shader
#[derive(Debug, Clone)]
pub struct Lighting {
    pub ambient_intensity: f32,
    pub directional_intensity: f32,
    /// Position the directional light shines from, towards the origin
    pub directional_position: Vector3<f32>,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            ambient_intensity: 0.5,
            directional_intensity: 0.8,
            directional_position: Vector3::new(5.0, 5.0, 5.0),
        }
    }
}

/// The active point cloud together with its accumulated model rotation
#[derive(Debug, Clone)]
pub struct ShapeCloud {
    pub shape: Shape,
    pub cloud: ColoredPointCloud3f,
    pub rotation_x: f32,
    pub rotation_y: f32,
}

impl ShapeCloud {
    fn new(shape: Shape) -> Self {
        Self {
            shape,
            cloud: shape.generate(),
            rotation_x: 0.0,
            rotation_y: 0.0,
        }
    }

    /// Model matrix for the cloud, positioned at the origin
    pub fn model_matrix(&self) -> Matrix4<f32> {
        UnitQuaternion::from_euler_angles(self.rotation_x, self.rotation_y, 0.0).to_homogeneous()
    }
}

/// Ownership root for everything the renderer draws
#[derive(Debug, Clone)]
pub struct Scene {
    pub backdrop: Backdrop,
    pub lighting: Lighting,
    cloud: Option<ShapeCloud>,
}

impl Scene {
    /// Create a scene seeded with the cube point cloud
    pub fn new() -> Self {
        Self {
            backdrop: Backdrop::default(),
            lighting: Lighting::default(),
            cloud: Some(ShapeCloud::new(Shape::Cube)),
        }
    }

    /// Replace the active point cloud with a freshly generated shape.
    ///
    /// Safe to call repeatedly and from any prior shape state; the slot
    /// always ends up holding exactly one cloud.
    pub fn set_shape(&mut self, shape: Shape) {
        self.cloud = Some(ShapeCloud::new(shape));
    }

    /// Remove the active point cloud, leaving the backdrop
    pub fn clear_cloud(&mut self) {
        self.cloud = None;
    }

    pub fn cloud(&self) -> Option<&ShapeCloud> {
        self.cloud.as_ref()
    }

    pub fn cloud_mut(&mut self) -> Option<&mut ShapeCloud> {
        self.cloud.as_mut()
    }

    /// Rotate the active cloud by the given radians; no-op when the slot is empty
    pub fn rotate_cloud(&mut self, dx: f32, dy: f32) {
        if let Some(cloud) = self.cloud.as_mut() {
            cloud.rotation_x += dx;
            cloud.rotation_y += dy;
        }
    }

    /// Advance the constant slow spin applied every frame
    pub fn tick(&mut self) {
        self.rotate_cloud(0.0, IDLE_SPIN);
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_seeds_cube() {
        let scene = Scene::new();
        let cloud = scene.cloud().expect("initial cloud present");
        assert_eq!(cloud.shape, Shape::Cube);
        assert!(!cloud.cloud.is_empty());
    }

    #[test]
    fn shape_switch_is_idempotent() {
        let mut scene = Scene::new();

        for shape in [Shape::Sphere, Shape::Sphere, Shape::Circle, Shape::Cube] {
            scene.set_shape(shape);
            let cloud = scene.cloud().expect("exactly one cloud after generate");
            assert_eq!(cloud.shape, shape);
        }
    }

    #[test]
    fn regenerate_resets_rotation() {
        let mut scene = Scene::new();
        scene.rotate_cloud(0.3, -0.2);
        scene.set_shape(Shape::Circle);
        let cloud = scene.cloud().unwrap();
        assert_eq!(cloud.rotation_x, 0.0);
        assert_eq!(cloud.rotation_y, 0.0);
    }

    #[test]
    fn rotate_without_cloud_is_noop() {
        let mut scene = Scene::new();
        scene.clear_cloud();
        scene.rotate_cloud(0.1, 0.1);
        scene.tick();
        assert!(scene.cloud().is_none());
    }

    #[test]
    fn tick_advances_idle_spin() {
        let mut scene = Scene::new();
        scene.tick();
        scene.tick();
        let cloud = scene.cloud().unwrap();
        assert!((cloud.rotation_y - 2.0 * IDLE_SPIN).abs() < 1e-6);
        assert_eq!(cloud.rotation_x, 0.0);
    }
}
