//! System metrics polling
//!
//! A background thread fetches `/metrics` once immediately and then on a
//! fixed one second interval. Each success replaces the snapshot wholesale;
//! a failure sets a transient error while the previous snapshot stays on
//! display and polling continues.

use crate::api::Backend;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use teleop_core::Result;

/// Fixed polling interval
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub total: u64,
    pub used: u64,
    pub percent: f64,
}

/// One point-in-time reading of remote system utilization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub cpu_percent: f64,
    pub memory: ResourceUsage,
    pub disk: ResourceUsage,
}

/// Displayed poller state: latest snapshot plus transient error
#[derive(Debug, Clone, Default)]
pub struct MetricsState {
    pub snapshot: Option<MetricsSnapshot>,
    pub error: Option<String>,
    pub ticks: u64,
}

impl MetricsState {
    /// Fold one fetch outcome into the displayed state.
    ///
    /// The error flag reflects only the most recent tick; a stale snapshot
    /// is retained across failures.
    pub fn apply(&mut self, outcome: Result<MetricsSnapshot>) {
        self.ticks += 1;
        match outcome {
            Ok(snapshot) => {
                self.snapshot = Some(snapshot);
                self.error = None;
            }
            Err(e) => {
                self.error = Some(e.to_string());
            }
        }
    }
}

/// Background poller for the metrics endpoint
pub struct MetricsPoller {
    state: Arc<Mutex<MetricsState>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MetricsPoller {
    /// Start polling; the first fetch happens immediately
    pub fn start(backend: Arc<dyn Backend>) -> Self {
        let state = Arc::new(Mutex::new(MetricsState::default()));
        let stop = Arc::new(AtomicBool::new(false));

        let thread_state = state.clone();
        let thread_stop = stop.clone();
        let handle = std::thread::spawn(move || {
            while !thread_stop.load(Ordering::Relaxed) {
                let fetch_started = Instant::now();
                let outcome = backend.fetch_metrics();
                if let Err(e) = &outcome {
                    log::warn!("metrics fetch failed: {}", e);
                }
                thread_state.lock().unwrap().apply(outcome);

                // Ticks stay on a fixed clock: the fetch duration comes out
                // of the sleep. Sleep in short slices so stop() is honored
                // promptly.
                let slice = POLL_INTERVAL.saturating_sub(fetch_started.elapsed()) / 10;
                for _ in 0..10 {
                    if thread_stop.load(Ordering::Relaxed) {
                        return;
                    }
                    std::thread::sleep(slice);
                }
            }
        });

        Self {
            state,
            stop,
            handle: Some(handle),
        }
    }

    /// Latest displayed state
    pub fn latest(&self) -> MetricsState {
        self.state.lock().unwrap().clone()
    }

    /// Cancel the polling thread and wait for it to finish
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MetricsPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{RecordingKind, SaveResponse, ScreenshotKind};
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use teleop_core::Error;

    fn snapshot(cpu: f64) -> MetricsSnapshot {
        MetricsSnapshot {
            cpu_percent: cpu,
            ..Default::default()
        }
    }

    #[test]
    fn state_keeps_last_success_across_failure() {
        let mut state = MetricsState::default();
        let outcomes: VecDeque<Result<MetricsSnapshot>> = VecDeque::from([
            Ok(snapshot(10.0)),
            Err(Error::Http("boom".to_string())),
            Ok(snapshot(30.0)),
        ]);

        let mut expected_cpu = [10.0, 10.0, 30.0].into_iter();
        let mut expected_error = [false, true, false].into_iter();
        for outcome in outcomes {
            state.apply(outcome);
            assert_eq!(
                state.snapshot.as_ref().unwrap().cpu_percent,
                expected_cpu.next().unwrap()
            );
            assert_eq!(state.error.is_some(), expected_error.next().unwrap());
        }
    }

    #[test]
    fn failure_before_first_success_leaves_no_snapshot() {
        let mut state = MetricsState::default();
        state.apply(Err(Error::Http("unreachable".to_string())));
        assert!(state.snapshot.is_none());
        assert!(state.error.is_some());
    }

    struct CountingBackend {
        fetches: AtomicUsize,
    }

    impl Backend for CountingBackend {
        fn fetch_metrics(&self) -> Result<MetricsSnapshot> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(snapshot(1.0))
        }

        fn save_screenshot(&self, _: &str, _: ScreenshotKind) -> Result<SaveResponse> {
            unimplemented!()
        }

        fn download_screenshot(&self, _: &str) -> Result<Vec<u8>> {
            unimplemented!()
        }

        fn save_recording(&self, _: Vec<u8>, _: RecordingKind) -> Result<SaveResponse> {
            unimplemented!()
        }

        fn download_recording(&self, _: &str) -> Result<Vec<u8>> {
            unimplemented!()
        }
    }

    struct SlowBackend {
        fetches: AtomicUsize,
    }

    impl Backend for SlowBackend {
        fn fetch_metrics(&self) -> Result<MetricsSnapshot> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(400));
            Ok(snapshot(2.0))
        }

        fn save_screenshot(&self, _: &str, _: ScreenshotKind) -> Result<SaveResponse> {
            unimplemented!()
        }

        fn download_screenshot(&self, _: &str) -> Result<Vec<u8>> {
            unimplemented!()
        }

        fn save_recording(&self, _: Vec<u8>, _: RecordingKind) -> Result<SaveResponse> {
            unimplemented!()
        }

        fn download_recording(&self, _: &str) -> Result<Vec<u8>> {
            unimplemented!()
        }
    }

    #[test]
    fn cadence_unaffected_by_fetch_duration() {
        // With a 400 ms fetch, the second tick must still land at the one
        // second mark rather than at fetch-plus-interval
        let backend = Arc::new(SlowBackend {
            fetches: AtomicUsize::new(0),
        });
        let mut poller = MetricsPoller::start(backend.clone());

        std::thread::sleep(Duration::from_millis(1200));
        assert!(backend.fetches.load(Ordering::SeqCst) >= 2);
        poller.stop();
    }

    #[test]
    fn poller_fetches_immediately_and_stops_on_request() {
        let backend = Arc::new(CountingBackend {
            fetches: AtomicUsize::new(0),
        });
        let mut poller = MetricsPoller::start(backend.clone());

        // First fetch fires without waiting for the interval
        std::thread::sleep(Duration::from_millis(100));
        assert!(backend.fetches.load(Ordering::SeqCst) >= 1);
        assert_eq!(poller.latest().snapshot.unwrap().cpu_percent, 1.0);

        poller.stop();
        let after_stop = backend.fetches.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(250));
        assert_eq!(backend.fetches.load(Ordering::SeqCst), after_stop);
    }
}
