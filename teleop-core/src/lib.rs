//! Core data structures and state for the teleop dashboard
//!
//! This crate provides the fundamental types shared by the viewer, renderer
//! and capture components: colored points, point clouds, the procedural shape
//! generators, the scene model and the orbit camera.

pub mod camera;
pub mod error;
pub mod point;
pub mod point_cloud;
pub mod scene;
pub mod shapes;

pub use camera::*;
pub use error::*;
pub use point::*;
pub use point_cloud::*;
pub use scene::*;
pub use shapes::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Matrix4, Point3, Vector3};

/// Common result type for teleop operations
pub type Result<T> = std::result::Result<T, Error>;
