//! Screen frame capture for the screen recorder

use crate::FrameSource;
use teleop_core::{Error, Result};
use xcap::Monitor;

/// Frame source capturing the primary monitor
pub struct ScreenSource {
    monitor: Monitor,
}

impl ScreenSource {
    /// Acquire the primary monitor; fails when no display is available
    pub fn primary() -> Result<Self> {
        let monitors = Monitor::all()
            .map_err(|e| Error::Capture(format!("monitor enumeration failed: {}", e)))?;
        let monitor = monitors
            .into_iter()
            .find(|m| m.is_primary())
            .ok_or_else(|| Error::Capture("no primary monitor found".to_string()))?;
        log::info!(
            "capturing screen {} ({}x{})",
            monitor.name(),
            monitor.width(),
            monitor.height()
        );
        Ok(Self { monitor })
    }
}

impl FrameSource for ScreenSource {
    fn next_frame(&mut self) -> Result<image::RgbImage> {
        let rgba = self
            .monitor
            .capture_image()
            .map_err(|e| Error::Capture(format!("screen grab failed: {}", e)))?;
        Ok(image::DynamicImage::ImageRgba8(rgba).to_rgb8())
    }
}
