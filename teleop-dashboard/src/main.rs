//! Teleop dashboard shell
//!
//! Wires the three dashboard components together: the interactive 3D viewer,
//! the capture controller and the metrics poller. The shell is the only
//! cross-component caller; it hands still frames exported by the viewer to
//! the capture controller for upload.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use teleop_capture::CaptureController;
use teleop_client::{HttpBackend, MetricsPoller, MetricsState, RecordingKind};
use teleop_viewer::{ShellHooks, Viewer};

#[derive(Parser, Debug)]
#[command(name = "teleop-dashboard", about, version)]
struct Args {
    /// Base URL of the teleop backend service
    #[arg(long, env = "TELEOP_BACKEND_URL", default_value = "http://localhost:5000")]
    backend_url: String,

    /// Camera device index
    #[arg(long, default_value_t = 0)]
    camera_index: u32,

    /// Directory downloaded screenshots and recordings are written to
    #[arg(long, default_value = "downloads")]
    downloads_dir: PathBuf,
}

/// Shell state behind the viewer's delegation seam
struct Shell {
    capture: CaptureController,
    poller: MetricsPoller,
    last_metrics_log: Instant,
    last_shown: MetricsState,
}

impl Shell {
    fn log_metrics(&mut self) {
        // Surface the poller state about once a second
        if self.last_metrics_log.elapsed() < Duration::from_secs(1) {
            return;
        }
        self.last_metrics_log = Instant::now();

        let state = self.poller.latest();
        if let Some(error) = &state.error {
            if self.last_shown.error.as_deref() != Some(error) {
                log::warn!("metrics error: {} (showing last good reading)", error);
            }
        } else if let Some(snapshot) = &state.snapshot {
            const GB: f64 = 1024.0 * 1024.0 * 1024.0;
            log::info!(
                "cpu {:.1}% | mem {:.0}GB/{:.0}GB ({:.1}%) | disk {:.0}GB/{:.0}GB ({:.1}%)",
                snapshot.cpu_percent,
                snapshot.memory.used as f64 / GB,
                snapshot.memory.total as f64 / GB,
                snapshot.memory.percent,
                snapshot.disk.used as f64 / GB,
                snapshot.disk.total as f64 / GB,
                snapshot.disk.percent,
            );
        } else if state.ticks == 0 {
            log::info!("loading metrics...");
        }
        self.last_shown = state;
    }
}

impl ShellHooks for Shell {
    fn capture_screenshot(&mut self) {
        self.capture.capture_screenshot();
    }

    fn capture_3d(&mut self, frame: Option<Vec<u8>>) {
        self.capture.capture_3d(frame);
    }

    fn toggle_recording(&mut self) {
        self.capture.toggle_recording();
    }

    fn toggle_screen_recording(&mut self) {
        self.capture.toggle_screen_recording();
    }

    fn toggle_mirror(&mut self) {
        self.capture.toggle_mirror();
    }

    fn toggle_audio(&mut self) {
        self.capture.toggle_audio();
    }

    fn download_latest_recording(&mut self) {
        self.capture.download_latest(RecordingKind::Webcam);
    }

    fn download_latest_screen_recording(&mut self) {
        self.capture.download_latest(RecordingKind::Screen);
    }

    fn on_frame(&mut self) {
        self.log_metrics();
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    log::info!("teleop dashboard starting, backend {}", args.backend_url);

    let backend = Arc::new(HttpBackend::new(&args.backend_url)?);

    let capture = CaptureController::new(backend.clone(), args.camera_index, args.downloads_dir);
    if let Some(error) = capture.camera_error() {
        log::warn!("capture controls disabled: {}", error);
    }

    let poller = MetricsPoller::start(backend);

    let shell = Shell {
        capture,
        poller,
        last_metrics_log: Instant::now() - Duration::from_secs(1),
        last_shown: MetricsState::default(),
    };

    // Blocks until the viewer window closes; dropping the shell afterwards
    // stops the poller thread, the recorders and the camera stream
    Viewer::new().run(shell)?;

    log::info!("teleop dashboard shutting down");
    Ok(())
}
