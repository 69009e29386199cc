//! Orbit camera for the point cloud viewer
//!
//! The camera revolves around a fixed target on a clamped spherical shell:
//! polar angle restricted to the upper hemisphere so the view never flips
//! below the horizon, distance clamped to `[5, 30]`. Pointer input moves a
//! set of goal angles that the current angles approach with damping each
//! frame, matching the feel of damped orbit controls.

use nalgebra::{Matrix4, Perspective3, Point3, Vector3};

/// Closest the camera may orbit to the target
pub const MIN_DISTANCE: f32 = 5.0;
/// Farthest the camera may orbit from the target
pub const MAX_DISTANCE: f32 = 30.0;
/// Fraction of the remaining goal delta applied per frame
pub const DAMPING_FACTOR: f32 = 0.05;
/// Distance change per keyboard zoom step
pub const KEY_ZOOM_STEP: f32 = 1.0;

const MIN_POLAR: f32 = 0.01;
const MAX_POLAR: f32 = std::f32::consts::FRAC_PI_2;

/// A perspective orbit camera with damped interaction
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    pub target: Point3<f32>,
    pub fov: f32,
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,

    // Current spherical coordinates around the target
    yaw: f32,
    polar: f32,
    distance: f32,

    // Goal coordinates the damping advances towards
    goal_yaw: f32,
    goal_polar: f32,
    goal_distance: f32,
}

impl OrbitCamera {
    /// Create a camera orbiting the origin from the given starting position
    pub fn from_position(position: Point3<f32>, aspect_ratio: f32) -> Self {
        let offset = position - Point3::origin();
        let distance = offset.norm().clamp(MIN_DISTANCE, MAX_DISTANCE);
        let polar = (offset.y / offset.norm()).acos().clamp(MIN_POLAR, MAX_POLAR);
        let yaw = offset.x.atan2(offset.z);

        Self {
            target: Point3::origin(),
            fov: 75.0_f32.to_radians(),
            aspect_ratio,
            near: 0.1,
            far: 1000.0,
            yaw,
            polar,
            distance,
            goal_yaw: yaw,
            goal_polar: polar,
            goal_distance: distance,
        }
    }

    /// World-space camera position for the current (damped) coordinates
    pub fn position(&self) -> Point3<f32> {
        let offset = Vector3::new(
            self.polar.sin() * self.yaw.sin(),
            self.polar.cos(),
            self.polar.sin() * self.yaw.cos(),
        ) * self.distance;
        self.target + offset
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    /// Get the view matrix
    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(&self.position(), &self.target, &Vector3::y())
    }

    /// Get the projection matrix
    pub fn projection_matrix(&self) -> Matrix4<f32> {
        Perspective3::new(self.aspect_ratio, self.fov, self.near, self.far).into_inner()
    }

    /// Orbit by screen-space drag deltas (radians)
    pub fn orbit(&mut self, delta_yaw: f32, delta_polar: f32) {
        self.goal_yaw += delta_yaw;
        self.goal_polar = (self.goal_polar + delta_polar).clamp(MIN_POLAR, MAX_POLAR);
    }

    /// Wheel zoom by a signed scroll amount; positive zooms in
    pub fn zoom(&mut self, amount: f32) {
        self.goal_distance = (self.goal_distance - amount).clamp(MIN_DISTANCE, MAX_DISTANCE);
    }

    /// Keyboard zoom in: one step closer, floored at the minimum distance.
    /// Applied immediately, bypassing damping.
    pub fn zoom_in_step(&mut self) {
        self.goal_distance = (self.goal_distance - KEY_ZOOM_STEP).max(MIN_DISTANCE);
        self.distance = self.goal_distance;
    }

    /// Keyboard zoom out: one step farther, ceiled at the maximum distance
    pub fn zoom_out_step(&mut self) {
        self.goal_distance = (self.goal_distance + KEY_ZOOM_STEP).min(MAX_DISTANCE);
        self.distance = self.goal_distance;
    }

    /// Advance orbit damping by one frame
    pub fn update(&mut self) {
        self.yaw += (self.goal_yaw - self.yaw) * DAMPING_FACTOR;
        self.polar += (self.goal_polar - self.polar) * DAMPING_FACTOR;
        self.distance += (self.goal_distance - self.distance) * DAMPING_FACTOR;
    }

    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.aspect_ratio = aspect_ratio;
    }
}

impl Default for OrbitCamera {
    fn default() -> Self {
        // Initial view: above and behind the origin
        Self::from_position(Point3::new(0.0, 5.0, 15.0), 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn initial_position_round_trips() {
        let camera = OrbitCamera::default();
        let pos = camera.position();
        assert_relative_eq!(pos.x, 0.0, epsilon = 1e-4);
        assert_relative_eq!(pos.y, 5.0, epsilon = 1e-3);
        assert_relative_eq!(pos.z, 15.0, epsilon = 1e-3);
    }

    #[test]
    fn keyboard_zoom_clamps_to_range() {
        let mut camera = OrbitCamera::default();

        for _ in 0..50 {
            camera.zoom_in_step();
        }
        assert_eq!(camera.distance(), MIN_DISTANCE);

        for _ in 0..50 {
            camera.zoom_out_step();
        }
        assert_eq!(camera.distance(), MAX_DISTANCE);
    }

    #[test]
    fn wheel_zoom_clamps_after_damping() {
        let mut camera = OrbitCamera::default();
        camera.zoom(1000.0);
        for _ in 0..500 {
            camera.update();
        }
        assert!(camera.distance() >= MIN_DISTANCE - 1e-3);

        camera.zoom(-1000.0);
        for _ in 0..500 {
            camera.update();
        }
        assert!(camera.distance() <= MAX_DISTANCE + 1e-3);
    }

    #[test]
    fn mixed_zoom_sequence_stays_clamped() {
        let mut camera = OrbitCamera::default();
        for i in 0..200 {
            if i % 3 == 0 {
                camera.zoom_in_step();
            } else {
                camera.zoom(if i % 2 == 0 { 4.0 } else { -7.0 });
            }
            camera.update();
            assert!(camera.distance() >= MIN_DISTANCE - 1e-3);
            assert!(camera.distance() <= MAX_DISTANCE + 1e-3);
        }
    }

    #[test]
    fn polar_clamped_to_upper_hemisphere() {
        let mut camera = OrbitCamera::default();
        camera.orbit(0.0, 100.0);
        for _ in 0..500 {
            camera.update();
        }
        // Never below the horizon
        assert!(camera.position().y >= -1e-3);
    }
}
