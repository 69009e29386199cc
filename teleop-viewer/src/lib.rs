//! Interactive viewer window for the teleop dashboard
//!
//! Runs the render loop over the scene: orbit/zoom pointer interaction,
//! keyboard rotation and zoom, shape regeneration, resize adaptation and
//! fullscreen/help toggles. Capture and metrics actions are delegated to
//! the shell through [`ShellHooks`].

pub mod viewer;

pub use viewer::*;
