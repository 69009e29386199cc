//! Capture pipeline for the teleop dashboard
//!
//! Owns the webcam feed, still screenshots and the chunked recorders for
//! webcam and screen. Recording chunks are MJPEG buffers flushed on an
//! interval and uploaded to the backend as they become available.

pub mod controller;
pub mod recorder;
pub mod screen;
pub mod webcam;

pub use controller::*;
pub use recorder::*;
pub use screen::*;
pub use webcam::*;

use teleop_core::Result;

/// A source of video frames for recording
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<image::RgbImage>;
}
