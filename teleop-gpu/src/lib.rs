//! GPU rendering for the teleop dashboard
//!
//! Draws the scene (room shell, grid, active point cloud) with wgpu and
//! provides a still-frame PNG export of the current view.

pub mod backdrop;
pub mod device;
pub mod renderer;

pub use device::*;
pub use renderer::*;
