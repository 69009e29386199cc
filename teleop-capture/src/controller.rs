//! Capture controller: webcam lifecycle, screenshots and recording toggles

use crate::recorder::{ChunkRecorder, RecorderConfig, UploadSink};
use crate::screen::ScreenSource;
use crate::webcam::{encode_data_url, WebcamFeed, WebcamSource};
use crate::FrameSource;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use teleop_client::{save_and_download_screenshot, Backend, RecordingKind, ScreenshotKind};
use teleop_core::{Error, Result};

/// One recording lane: the live session plus the chunk filename history.
///
/// The history outlives the session on purpose; most chunks arrive at stop
/// and the download action has to keep working after the recorder is gone.
/// Starting a new session replaces the history.
struct RecordingLane {
    kind: RecordingKind,
    recorder: Option<ChunkRecorder>,
    sink: Option<Arc<UploadSink>>,
}

impl RecordingLane {
    fn new(kind: RecordingKind) -> Self {
        Self {
            kind,
            recorder: None,
            sink: None,
        }
    }

    fn is_active(&self) -> bool {
        self.recorder.is_some()
    }

    fn start(
        &mut self,
        backend: Arc<dyn Backend>,
        source: impl FrameSource + 'static,
        config: RecorderConfig,
    ) {
        let sink = Arc::new(UploadSink::new(backend, self.kind));
        self.recorder = Some(ChunkRecorder::start(source, sink.clone(), config));
        self.sink = Some(sink);
    }

    /// Stop the session, flushing the pending chunk; history is retained
    fn stop(&mut self) {
        if let Some(mut recorder) = self.recorder.take() {
            recorder.stop();
        }
    }

    /// Most recent stored chunk filename, live session or not
    fn latest(&self) -> Option<String> {
        self.sink.as_ref().and_then(|s| s.latest())
    }
}

fn save_download(downloads_dir: &Path, filename: &str, bytes: &[u8]) {
    let path = downloads_dir.join(filename);
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match std::fs::write(&path, bytes) {
        Ok(()) => log::info!("downloaded {}", path.display()),
        Err(e) => log::error!("failed to write {}: {}", path.display(), e),
    }
}

/// Owns the live camera, the recorders and their upload state
pub struct CaptureController {
    backend: Arc<dyn Backend>,
    camera_index: u32,
    downloads_dir: PathBuf,

    webcam: Option<Arc<Mutex<WebcamFeed>>>,
    camera_error: Option<String>,
    mirrored: bool,
    audio_enabled: bool,

    webcam_lane: RecordingLane,
    screen_lane: RecordingLane,
}

impl CaptureController {
    /// Acquire the camera and set up capture state.
    ///
    /// Camera denial or hardware failure is not fatal: the error is kept as
    /// a persistent state and every dependent action refuses to run.
    pub fn new(backend: Arc<dyn Backend>, camera_index: u32, downloads_dir: PathBuf) -> Self {
        let (webcam, camera_error) = match WebcamFeed::open(camera_index) {
            Ok(feed) => (Some(Arc::new(Mutex::new(feed))), None),
            Err(e) => {
                log::error!("webcam unavailable: {}", e);
                (None, Some(e.to_string()))
            }
        };

        Self {
            backend,
            camera_index,
            downloads_dir,
            webcam,
            camera_error,
            mirrored: false,
            audio_enabled: true,
            webcam_lane: RecordingLane::new(RecordingKind::Webcam),
            screen_lane: RecordingLane::new(RecordingKind::Screen),
        }
    }

    /// Persistent camera error, if acquisition failed
    pub fn camera_error(&self) -> Option<&str> {
        self.camera_error.as_deref()
    }

    pub fn is_recording(&self) -> bool {
        self.webcam_lane.is_active()
    }

    pub fn is_screen_recording(&self) -> bool {
        self.screen_lane.is_active()
    }

    pub fn mirrored(&self) -> bool {
        self.mirrored
    }

    pub fn audio_enabled(&self) -> bool {
        self.audio_enabled
    }

    fn feed(&self) -> Result<&Arc<Mutex<WebcamFeed>>> {
        self.webcam
            .as_ref()
            .ok_or_else(|| Error::Capture("camera not available".to_string()))
    }

    /// Capture a webcam still and upload it; the stored file is then fetched
    /// into the downloads directory. Upload failures are logged only.
    ///
    /// The frame grab and the network round trip run on a worker thread so
    /// a slow backend never stalls the render loop.
    pub fn capture_screenshot(&self) {
        let feed = match self.feed() {
            Ok(feed) => feed.clone(),
            Err(e) => {
                log::warn!("screenshot unavailable: {}", e);
                return;
            }
        };
        let backend = self.backend.clone();
        let downloads_dir = self.downloads_dir.clone();
        std::thread::spawn(move || {
            let data_url = match feed.lock().unwrap().screenshot_data_url() {
                Ok(url) => url,
                Err(e) => {
                    log::error!("screenshot capture failed: {}", e);
                    return;
                }
            };
            match save_and_download_screenshot(backend.as_ref(), &data_url, ScreenshotKind::Webcam)
            {
                Ok((filename, bytes)) => save_download(&downloads_dir, &filename, &bytes),
                Err(e) => log::error!("error saving screenshot: {}", e),
            }
        });
    }

    /// Upload a still frame exported by the 3D viewer.
    ///
    /// Invoked by the shell, which owns the renderer; a missing frame means
    /// no draw surface was mounted and the capture silently no-ops. The
    /// upload itself runs on a worker thread.
    pub fn capture_3d(&self, frame: Option<Vec<u8>>) {
        let Some(png) = frame else { return };
        let backend = self.backend.clone();
        let downloads_dir = self.downloads_dir.clone();
        std::thread::spawn(move || {
            let data_url = encode_data_url(&png);
            match save_and_download_screenshot(backend.as_ref(), &data_url, ScreenshotKind::ThreeD)
            {
                Ok((filename, bytes)) => save_download(&downloads_dir, &filename, &bytes),
                Err(e) => log::error!("error saving 3D screenshot: {}", e),
            }
        });
    }

    /// Two-state webcam recording toggle; stopping flushes the pending chunk
    pub fn toggle_recording(&mut self) {
        if self.webcam_lane.is_active() {
            self.webcam_lane.stop();
            log::info!(
                "webcam recording stopped, latest chunk: {:?}",
                self.webcam_lane.latest()
            );
            return;
        }

        let feed = match self.feed() {
            Ok(feed) => feed.clone(),
            Err(e) => {
                log::warn!("recording unavailable: {}", e);
                return;
            }
        };
        self.webcam_lane.start(
            self.backend.clone(),
            WebcamSource::new(feed),
            RecorderConfig::default(),
        );
        log::info!("webcam recording started");
    }

    /// Two-state screen recording toggle, independent of the webcam session
    pub fn toggle_screen_recording(&mut self) {
        if self.screen_lane.is_active() {
            self.screen_lane.stop();
            log::info!(
                "screen recording stopped, latest chunk: {:?}",
                self.screen_lane.latest()
            );
            return;
        }

        let source = match ScreenSource::primary() {
            Ok(source) => source,
            Err(e) => {
                log::error!("error starting screen recording: {}", e);
                return;
            }
        };
        self.screen_lane
            .start(self.backend.clone(), source, RecorderConfig::default());
        log::info!("screen recording started");
    }

    /// Most recent stored webcam chunk filename
    pub fn latest_recording(&self) -> Option<String> {
        self.webcam_lane.latest()
    }

    /// Most recent stored screen chunk filename
    pub fn latest_screen_recording(&self) -> Option<String> {
        self.screen_lane.latest()
    }

    /// Fetch the most recent recording of the given kind into downloads.
    /// The download runs on a worker thread.
    pub fn download_latest(&self, kind: RecordingKind) {
        let latest = match kind {
            RecordingKind::Webcam => self.webcam_lane.latest(),
            RecordingKind::Screen => self.screen_lane.latest(),
        };
        let Some(filename) = latest else {
            log::warn!("no stored {} recording yet", kind.as_str());
            return;
        };
        let backend = self.backend.clone();
        let downloads_dir = self.downloads_dir.clone();
        std::thread::spawn(move || match backend.download_recording(&filename) {
            Ok(bytes) => save_download(&downloads_dir, &filename, &bytes),
            Err(e) => log::error!("error downloading recording: {}", e),
        });
    }

    /// Mirror the preview and screenshots; presentation state only
    pub fn toggle_mirror(&mut self) {
        self.mirrored = !self.mirrored;
        if let Some(feed) = self.webcam.as_ref() {
            feed.lock().unwrap().set_mirrored(self.mirrored);
        }
    }

    /// Toggle the audio constraint and re-acquire the camera to apply it.
    ///
    /// The native pipeline records video only; the toggle still tears the
    /// feed down and back up the way the constraint change requires.
    pub fn toggle_audio(&mut self) {
        self.audio_enabled = !self.audio_enabled;
        log::info!(
            "audio {}",
            if self.audio_enabled { "enabled" } else { "disabled" }
        );

        match WebcamFeed::open(self.camera_index) {
            Ok(mut fresh) => {
                fresh.set_mirrored(self.mirrored);
                match self.webcam.as_ref() {
                    // Swap the stream in place so an active recorder keeps
                    // pulling from the shared slot
                    Some(slot) => *slot.lock().unwrap() = fresh,
                    None => self.webcam = Some(Arc::new(Mutex::new(fresh))),
                }
                self.camera_error = None;
            }
            Err(e) => {
                log::error!("failed to re-acquire camera: {}", e);
                self.abandon_feed(e.to_string());
            }
        }
    }

    /// Drop the camera feed and stop any recording still pulling from it
    fn abandon_feed(&mut self, error: String) {
        self.camera_error = Some(error);
        self.webcam = None;
        if self.webcam_lane.is_active() {
            log::warn!("webcam feed lost, stopping active recording");
            self.webcam_lane.stop();
        }
    }
}

impl Drop for CaptureController {
    // Stop recorders before the feed so in-flight chunks flush, then the
    // camera hardware is released by the feed's own drop
    fn drop(&mut self) {
        self.webcam_lane.stop();
        self.screen_lane.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};
    use teleop_client::{MetricsSnapshot, SaveResponse};

    // An index no backend enumerates, so acquisition fails deterministically
    const NO_CAMERA: u32 = u32::MAX;

    struct TestPatternSource;

    impl FrameSource for TestPatternSource {
        fn next_frame(&mut self) -> Result<image::RgbImage> {
            Ok(image::RgbImage::from_pixel(4, 4, image::Rgb([7, 7, 7])))
        }
    }

    fn fast_config() -> RecorderConfig {
        RecorderConfig {
            frame_interval: Duration::from_millis(1),
            chunk_frames: 2,
        }
    }

    #[derive(Default)]
    struct RecordingBackend {
        saves: AtomicUsize,
        downloads: Mutex<Vec<String>>,
    }

    impl Backend for RecordingBackend {
        fn fetch_metrics(&self) -> Result<MetricsSnapshot> {
            unimplemented!()
        }
        fn save_screenshot(&self, _: &str, _: ScreenshotKind) -> Result<SaveResponse> {
            unimplemented!()
        }
        fn download_screenshot(&self, _: &str) -> Result<Vec<u8>> {
            unimplemented!()
        }
        fn save_recording(&self, _: Vec<u8>, kind: RecordingKind) -> Result<SaveResponse> {
            let n = self.saves.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(SaveResponse {
                success: true,
                filename: format!("{}_{}.mjpeg", kind.as_str(), n),
            })
        }
        fn download_recording(&self, filename: &str) -> Result<Vec<u8>> {
            self.downloads.lock().unwrap().push(filename.to_string());
            Ok(vec![0xFF, 0xD8])
        }
    }

    #[test]
    fn download_history_survives_session_stop() {
        let backend = Arc::new(RecordingBackend::default());
        let mut lane = RecordingLane::new(RecordingKind::Webcam);
        lane.start(backend.clone(), TestPatternSource, fast_config());
        std::thread::sleep(Duration::from_millis(50));
        lane.stop();

        assert!(!lane.is_active());
        assert!(
            lane.latest().is_some(),
            "filename history must outlive the session"
        );
    }

    #[test]
    fn download_latest_works_after_recording_stops() {
        let backend = Arc::new(RecordingBackend::default());
        let mut controller = CaptureController::new(
            backend.clone(),
            NO_CAMERA,
            std::env::temp_dir().join("teleop_dl_test"),
        );

        controller
            .screen_lane
            .start(backend.clone(), TestPatternSource, fast_config());
        std::thread::sleep(Duration::from_millis(50));
        controller.toggle_screen_recording();
        assert!(!controller.is_screen_recording());

        let latest = controller.latest_screen_recording();
        assert!(latest.is_some());

        controller.download_latest(RecordingKind::Screen);
        std::thread::sleep(Duration::from_millis(300));
        let downloads = backend.downloads.lock().unwrap();
        assert_eq!(downloads.as_slice(), &[latest.unwrap()]);
    }

    #[test]
    fn losing_the_feed_stops_active_recording() {
        let backend = Arc::new(RecordingBackend::default());
        let mut controller =
            CaptureController::new(backend.clone(), NO_CAMERA, std::env::temp_dir());

        controller
            .webcam_lane
            .start(backend, TestPatternSource, fast_config());
        assert!(controller.is_recording());

        controller.abandon_feed("device unplugged".to_string());
        assert!(!controller.is_recording());
        assert_eq!(controller.camera_error(), Some("device unplugged"));
    }

    #[test]
    fn capture_upload_never_blocks_the_caller() {
        struct StallingBackend;

        impl Backend for StallingBackend {
            fn fetch_metrics(&self) -> Result<MetricsSnapshot> {
                unimplemented!()
            }
            fn save_screenshot(&self, _: &str, _: ScreenshotKind) -> Result<SaveResponse> {
                std::thread::sleep(Duration::from_secs(1));
                Ok(SaveResponse {
                    success: true,
                    filename: "slow.png".to_string(),
                })
            }
            fn download_screenshot(&self, _: &str) -> Result<Vec<u8>> {
                Ok(Vec::new())
            }
            fn save_recording(&self, _: Vec<u8>, _: RecordingKind) -> Result<SaveResponse> {
                unimplemented!()
            }
            fn download_recording(&self, _: &str) -> Result<Vec<u8>> {
                unimplemented!()
            }
        }

        let controller =
            CaptureController::new(Arc::new(StallingBackend), NO_CAMERA, std::env::temp_dir());

        let started = Instant::now();
        controller.capture_3d(Some(vec![0x89, b'P', b'N', b'G']));
        assert!(
            started.elapsed() < Duration::from_millis(200),
            "upload ran on the caller's thread"
        );
    }
}
