//! Webcam acquisition and still-frame capture

use crate::FrameSource;
use base64::Engine;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::Camera;
use std::sync::{Arc, Mutex};
use teleop_core::{Error, Result};

/// Preferred capture resolution, matching the dashboard's video constraints
pub const PREFERRED_WIDTH: u32 = 1280;
pub const PREFERRED_HEIGHT: u32 = 720;

/// A live webcam stream
pub struct WebcamFeed {
    camera: Camera,
    mirrored: bool,
}

impl WebcamFeed {
    /// Open the camera at the given index with the preferred resolution.
    ///
    /// Denial or hardware failure comes back as [`Error::Capture`]; callers
    /// keep the error as a persistent state and disable dependent actions.
    pub fn open(index: u32) -> Result<Self> {
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            CameraFormat::new(
                Resolution::new(PREFERRED_WIDTH, PREFERRED_HEIGHT),
                FrameFormat::MJPEG,
                30,
            ),
        ));
        let mut camera = Camera::new(CameraIndex::Index(index), requested)
            .map_err(|e| Error::Capture(format!("camera {} unavailable: {}", index, e)))?;
        camera
            .open_stream()
            .map_err(|e| Error::Capture(format!("failed to open camera stream: {}", e)))?;

        log::info!(
            "opened camera {} at {}",
            index,
            camera.camera_format()
        );
        Ok(Self {
            camera,
            mirrored: false,
        })
    }

    pub fn set_mirrored(&mut self, mirrored: bool) {
        self.mirrored = mirrored;
    }

    pub fn mirrored(&self) -> bool {
        self.mirrored
    }

    /// Grab one frame from the live feed, mirror applied when enabled
    pub fn frame(&mut self) -> Result<image::RgbImage> {
        let buffer = self
            .camera
            .frame()
            .map_err(|e| Error::Capture(format!("frame grab failed: {}", e)))?;
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| Error::Capture(format!("frame decode failed: {}", e)))?;
        if self.mirrored {
            Ok(image::imageops::flip_horizontal(&decoded))
        } else {
            Ok(decoded)
        }
    }

    /// Capture a still frame as a PNG data URL, ready for upload
    pub fn screenshot_data_url(&mut self) -> Result<String> {
        let frame = self.frame()?;
        let mut png = Vec::new();
        image::DynamicImage::ImageRgb8(frame)
            .write_to(
                &mut std::io::Cursor::new(&mut png),
                image::ImageFormat::Png,
            )
            .map_err(|e| Error::Capture(format!("PNG encode failed: {}", e)))?;
        Ok(encode_data_url(&png))
    }
}

impl Drop for WebcamFeed {
    // Release the camera hardware deterministically
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            log::warn!("failed to stop camera stream: {}", e);
        }
    }
}

/// PNG bytes to a `data:image/png;base64,...` URL
pub fn encode_data_url(png: &[u8]) -> String {
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png)
    )
}

/// Frame source sharing the live feed with the screenshot path
pub struct WebcamSource {
    feed: Arc<Mutex<WebcamFeed>>,
}

impl WebcamSource {
    pub fn new(feed: Arc<Mutex<WebcamFeed>>) -> Self {
        Self { feed }
    }
}

impl FrameSource for WebcamSource {
    fn next_frame(&mut self) -> Result<image::RgbImage> {
        self.feed
            .lock()
            .map_err(|_| Error::Capture("webcam feed poisoned".to_string()))?
            .frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_has_png_prefix() {
        let url = encode_data_url(&[0x89, b'P', b'N', b'G']);
        assert!(url.starts_with("data:image/png;base64,"));
        assert!(url.len() > "data:image/png;base64,".len());
    }
}
