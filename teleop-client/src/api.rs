//! Backend REST surface: uploads, downloads and the metrics endpoint

use crate::metrics::MetricsSnapshot;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use teleop_core::{Error, Result};

/// What a screenshot upload is tagged as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenshotKind {
    ThreeD,
    Webcam,
}

impl ScreenshotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScreenshotKind::ThreeD => "3d",
            ScreenshotKind::Webcam => "webcam",
        }
    }
}

/// What a recording chunk upload is tagged as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingKind {
    Webcam,
    Screen,
}

impl RecordingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordingKind::Webcam => "webcam",
            RecordingKind::Screen => "screen",
        }
    }
}

/// Response from the save-screenshot and save-recording endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveResponse {
    pub success: bool,
    pub filename: String,
}

#[derive(Serialize)]
struct SaveScreenshotRequest<'a> {
    image: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
}

/// The backend operations the dashboard consumes.
///
/// Seamed as a trait so components can be exercised against a fake backend.
pub trait Backend: Send + Sync {
    /// `GET /metrics`
    fn fetch_metrics(&self) -> Result<MetricsSnapshot>;

    /// `POST /save-screenshot` with a data-URL encoded image
    fn save_screenshot(&self, image: &str, kind: ScreenshotKind) -> Result<SaveResponse>;

    /// `GET /download-screenshot/:filename`
    fn download_screenshot(&self, filename: &str) -> Result<Vec<u8>>;

    /// `POST /save-recording` with a multipart chunk
    fn save_recording(&self, chunk: Vec<u8>, kind: RecordingKind) -> Result<SaveResponse>;

    /// `GET /download-recording/:filename`
    fn download_recording(&self, filename: &str) -> Result<Vec<u8>>;
}

/// reqwest-backed implementation of [`Backend`]
pub struct HttpBackend {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(8))
            .build()
            .map_err(|e| Error::Http(format!("client init failed: {}", e)))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn get_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .map_err(|e| Error::Http(format!("request failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(Error::Http(format!(
                "GET {} returned {}",
                path,
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .map_err(|e| Error::Http(format!("body read failed: {}", e)))?;
        Ok(bytes.to_vec())
    }
}

impl Backend for HttpBackend {
    fn fetch_metrics(&self) -> Result<MetricsSnapshot> {
        let response = self
            .client
            .get(self.url("metrics"))
            .send()
            .map_err(|e| Error::Http(format!("metrics request failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(Error::Http(format!(
                "metrics returned {}",
                response.status()
            )));
        }
        response
            .json::<MetricsSnapshot>()
            .map_err(|e| Error::Http(format!("invalid metrics payload: {}", e)))
    }

    fn save_screenshot(&self, image: &str, kind: ScreenshotKind) -> Result<SaveResponse> {
        let response = self
            .client
            .post(self.url("save-screenshot"))
            .json(&SaveScreenshotRequest {
                image,
                kind: kind.as_str(),
            })
            .send()
            .map_err(|e| Error::Http(format!("screenshot upload failed: {}", e)))?;
        response
            .json::<SaveResponse>()
            .map_err(|e| Error::Http(format!("invalid save-screenshot response: {}", e)))
    }

    fn download_screenshot(&self, filename: &str) -> Result<Vec<u8>> {
        self.get_bytes(&format!("download-screenshot/{}", filename))
    }

    fn save_recording(&self, chunk: Vec<u8>, kind: RecordingKind) -> Result<SaveResponse> {
        let part = reqwest::blocking::multipart::Part::bytes(chunk)
            .file_name("chunk.mjpeg")
            .mime_str("video/x-motion-jpeg")
            .map_err(|e| Error::Http(format!("invalid chunk mime: {}", e)))?;
        let form = reqwest::blocking::multipart::Form::new()
            .part("file", part)
            .text("type", kind.as_str());

        let response = self
            .client
            .post(self.url("save-recording"))
            .multipart(form)
            .send()
            .map_err(|e| Error::Http(format!("recording upload failed: {}", e)))?;
        response
            .json::<SaveResponse>()
            .map_err(|e| Error::Http(format!("invalid save-recording response: {}", e)))
    }

    fn download_recording(&self, filename: &str) -> Result<Vec<u8>> {
        self.get_bytes(&format!("download-recording/{}", filename))
    }
}

/// Upload a screenshot and, on success, fetch the stored file for download.
///
/// Mirrors the original flow: the save response's filename is immediately
/// requested back from the download endpoint. Returns the stored filename
/// together with the downloaded bytes.
pub fn save_and_download_screenshot(
    backend: &dyn Backend,
    image: &str,
    kind: ScreenshotKind,
) -> Result<(String, Vec<u8>)> {
    let saved = backend.save_screenshot(image, kind)?;
    if !saved.success {
        return Err(Error::Http("backend rejected screenshot".to_string()));
    }
    let bytes = backend.download_screenshot(&saved.filename)?;
    Ok((saved.filename, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsSnapshot;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeBackend {
        requests: Mutex<Vec<String>>,
    }

    impl Backend for FakeBackend {
        fn fetch_metrics(&self) -> Result<MetricsSnapshot> {
            self.requests.lock().unwrap().push("metrics".to_string());
            Ok(MetricsSnapshot::default())
        }

        fn save_screenshot(&self, _image: &str, kind: ScreenshotKind) -> Result<SaveResponse> {
            self.requests
                .lock()
                .unwrap()
                .push(format!("save-screenshot type={}", kind.as_str()));
            Ok(SaveResponse {
                success: true,
                filename: "shot1.png".to_string(),
            })
        }

        fn download_screenshot(&self, filename: &str) -> Result<Vec<u8>> {
            self.requests
                .lock()
                .unwrap()
                .push(format!("download-screenshot/{}", filename));
            Ok(vec![1, 2, 3])
        }

        fn save_recording(&self, _chunk: Vec<u8>, kind: RecordingKind) -> Result<SaveResponse> {
            self.requests
                .lock()
                .unwrap()
                .push(format!("save-recording type={}", kind.as_str()));
            Ok(SaveResponse {
                success: true,
                filename: "rec1.mjpeg".to_string(),
            })
        }

        fn download_recording(&self, filename: &str) -> Result<Vec<u8>> {
            self.requests
                .lock()
                .unwrap()
                .push(format!("download-recording/{}", filename));
            Ok(Vec::new())
        }
    }

    #[test]
    fn screenshot_save_then_download() {
        let backend = FakeBackend::default();
        let (filename, bytes) =
            save_and_download_screenshot(&backend, "data:image/png;base64,AAAA", ScreenshotKind::Webcam)
                .unwrap();
        assert_eq!(filename, "shot1.png");
        assert_eq!(bytes, vec![1, 2, 3]);

        let requests = backend.requests.lock().unwrap();
        assert_eq!(
            *requests,
            vec![
                "save-screenshot type=webcam".to_string(),
                "download-screenshot/shot1.png".to_string(),
            ]
        );
    }

    #[test]
    fn kinds_serialize_to_wire_tags() {
        assert_eq!(ScreenshotKind::ThreeD.as_str(), "3d");
        assert_eq!(ScreenshotKind::Webcam.as_str(), "webcam");
        assert_eq!(RecordingKind::Webcam.as_str(), "webcam");
        assert_eq!(RecordingKind::Screen.as_str(), "screen");
    }

    #[test]
    fn save_response_decodes_backend_payload() {
        let payload = r#"{"success": true, "filename": "webcam_screenshot_20250101_120000.png", "message": "Screenshot saved successfully"}"#;
        let response: SaveResponse = serde_json::from_str(payload).unwrap();
        assert!(response.success);
        assert_eq!(response.filename, "webcam_screenshot_20250101_120000.png");
    }
}
