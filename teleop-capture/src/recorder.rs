//! Chunked recording
//!
//! A recorder thread pulls frames from a [`FrameSource`], JPEG-encodes them
//! into an MJPEG buffer and flushes the buffer to a [`ChunkSink`] once it
//! holds enough frames. Stopping flushes the pending chunk; empty chunks are
//! never emitted.

use crate::FrameSource;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use teleop_client::{Backend, RecordingKind};

/// Frames captured per second while recording
pub const RECORD_FPS: u32 = 10;
/// Frames accumulated before a chunk is flushed
pub const CHUNK_FRAMES: usize = 30;

const JPEG_QUALITY: u8 = 80;

/// Receives flushed recording chunks
pub trait ChunkSink: Send + Sync {
    fn submit(&self, chunk: Vec<u8>);
}

/// Sink uploading chunks to the backend and tracking returned filenames
pub struct UploadSink {
    backend: Arc<dyn Backend>,
    kind: RecordingKind,
    filenames: Mutex<Vec<String>>,
}

impl UploadSink {
    pub fn new(backend: Arc<dyn Backend>, kind: RecordingKind) -> Self {
        Self {
            backend,
            kind,
            filenames: Mutex::new(Vec::new()),
        }
    }

    /// Most recently stored chunk filename, used for the download action
    pub fn latest(&self) -> Option<String> {
        self.filenames.lock().unwrap().last().cloned()
    }
}

impl ChunkSink for UploadSink {
    fn submit(&self, chunk: Vec<u8>) {
        if chunk.is_empty() {
            return;
        }
        // Upload failures are logged only; recording carries on
        match self.backend.save_recording(chunk, self.kind) {
            Ok(response) if response.success => {
                log::info!("stored {} chunk as {}", self.kind.as_str(), response.filename);
                self.filenames.lock().unwrap().push(response.filename);
            }
            Ok(_) => log::error!("backend rejected {} chunk", self.kind.as_str()),
            Err(e) => log::error!("error saving {} chunk: {}", self.kind.as_str(), e),
        }
    }
}

/// Parameters for a recorder thread
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    pub frame_interval: Duration,
    pub chunk_frames: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_secs(1) / RECORD_FPS,
            chunk_frames: CHUNK_FRAMES,
        }
    }
}

/// A running chunked recording session
pub struct ChunkRecorder {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ChunkRecorder {
    /// Start recording from the source into the sink
    pub fn start(
        mut source: impl FrameSource + 'static,
        sink: Arc<dyn ChunkSink>,
        config: RecorderConfig,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();

        let handle = std::thread::spawn(move || {
            let mut buffer: Vec<u8> = Vec::new();
            let mut frames_in_chunk = 0usize;

            while !thread_stop.load(Ordering::Relaxed) {
                match source.next_frame() {
                    Ok(frame) => {
                        let mut cursor = std::io::Cursor::new(&mut buffer);
                        cursor.set_position(cursor.get_ref().len() as u64);
                        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(
                            &mut cursor,
                            JPEG_QUALITY,
                        );
                        match frame.write_with_encoder(encoder) {
                            Ok(()) => frames_in_chunk += 1,
                            Err(e) => log::warn!("dropping frame, JPEG encode failed: {}", e),
                        }
                    }
                    Err(e) => log::warn!("dropping frame, capture failed: {}", e),
                }

                if frames_in_chunk >= config.chunk_frames {
                    sink.submit(std::mem::take(&mut buffer));
                    frames_in_chunk = 0;
                }

                std::thread::sleep(config.frame_interval);
            }

            // Stop flushes whatever is pending
            if !buffer.is_empty() {
                sink.submit(buffer);
            }
        });

        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Stop the session, flushing the pending chunk
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ChunkRecorder {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teleop_core::Result;

    struct SyntheticSource {
        frames: usize,
    }

    impl FrameSource for SyntheticSource {
        fn next_frame(&mut self) -> Result<image::RgbImage> {
            self.frames += 1;
            Ok(image::RgbImage::from_pixel(
                8,
                8,
                image::Rgb([(self.frames % 256) as u8, 0, 0]),
            ))
        }
    }

    #[derive(Default)]
    struct CollectingSink {
        chunks: Mutex<Vec<Vec<u8>>>,
    }

    impl ChunkSink for CollectingSink {
        fn submit(&self, chunk: Vec<u8>) {
            self.chunks.lock().unwrap().push(chunk);
        }
    }

    #[test]
    fn emits_chunks_while_recording() {
        let sink = Arc::new(CollectingSink::default());
        let config = RecorderConfig {
            frame_interval: Duration::from_millis(1),
            chunk_frames: 3,
        };
        let mut recorder =
            ChunkRecorder::start(SyntheticSource { frames: 0 }, sink.clone(), config);

        std::thread::sleep(Duration::from_millis(100));
        recorder.stop();

        let chunks = sink.chunks.lock().unwrap();
        assert!(!chunks.is_empty());
        for chunk in chunks.iter() {
            assert!(!chunk.is_empty());
            // Every chunk starts with a JPEG SOI marker
            assert_eq!(&chunk[..2], &[0xFF, 0xD8]);
        }
    }

    #[test]
    fn stop_flushes_pending_chunk_and_halts() {
        let sink = Arc::new(CollectingSink::default());
        let config = RecorderConfig {
            frame_interval: Duration::from_millis(1),
            // Never reaches the flush threshold while running
            chunk_frames: 1_000_000,
        };
        let mut recorder =
            ChunkRecorder::start(SyntheticSource { frames: 0 }, sink.clone(), config);

        std::thread::sleep(Duration::from_millis(50));
        assert!(sink.chunks.lock().unwrap().is_empty());

        recorder.stop();
        let count = sink.chunks.lock().unwrap().len();
        assert_eq!(count, 1);

        // Stopped session produces nothing further
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(sink.chunks.lock().unwrap().len(), count);
    }

    #[test]
    fn upload_sink_tracks_latest_filename() {
        use teleop_client::{MetricsSnapshot, SaveResponse, ScreenshotKind};

        struct SequencedBackend {
            counter: Mutex<usize>,
        }

        impl Backend for SequencedBackend {
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
                let mut counter = self.counter.lock().unwrap();
                *counter += 1;
                Ok(SaveResponse {
                    success: true,
                    filename: format!("{}_recording_{}.mjpeg", kind.as_str(), counter),
                })
            }
            fn download_recording(&self, _: &str) -> Result<Vec<u8>> {
                unimplemented!()
            }
        }

        let backend = Arc::new(SequencedBackend {
            counter: Mutex::new(0),
        });
        let sink = UploadSink::new(backend, RecordingKind::Screen);

        assert_eq!(sink.latest(), None);
        sink.submit(vec![1]);
        sink.submit(vec![2]);
        assert_eq!(sink.latest(), Some("screen_recording_2.mjpeg".to_string()));

        // Empty chunks are never uploaded
        sink.submit(Vec::new());
        assert_eq!(sink.latest(), Some("screen_recording_2.mjpeg".to_string()));
    }
}
