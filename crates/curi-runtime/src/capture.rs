//! Background capture task and its lifecycle.

use crate::FrameBuffer;
use camera_geometry::CameraSource;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub type SharedCamera = Arc<Mutex<Box<dyn CameraSource + Send>>>;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("a capture task is already running")]
    AlreadyRunning,
    #[error("failed to spawn capture thread: {0}")]
    Spawn(String),
}

#[derive(Debug, Default)]
pub struct CaptureStats {
    starts: AtomicU64,
    stops: AtomicU64,
    frames: AtomicU64,
    read_errors: AtomicU64,
}

impl CaptureStats {
    pub fn starts(&self) -> u64 {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> u64 {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn read_errors(&self) -> u64 {
        self.read_errors.load(Ordering::Relaxed)
    }
}

/// Owns the camera and the frame buffer; hands out one capture task at a time.
pub struct CaptureController {
    camera: SharedCamera,
    buffer: Arc<FrameBuffer>,
    interval: Duration,
    session: CancellationToken,
    running: Arc<AtomicBool>,
    stats: Arc<CaptureStats>,
}

/// The live capture task. Stopping consumes it; dropping it stops it too.
#[must_use = "dropping the handle stops capture immediately"]
pub struct CaptureTaskHandle {
    cancel: CancellationToken,
    thread: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
    stats: Arc<CaptureStats>,
}

impl CaptureController {
    pub fn new(
        camera: Box<dyn CameraSource + Send>,
        buffer: FrameBuffer,
        interval: Duration,
        session: CancellationToken,
    ) -> Self {
        Self {
            camera: Arc::new(Mutex::new(camera)),
            buffer: Arc::new(buffer),
            interval,
            session,
            running: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(CaptureStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<CaptureStats> {
        self.stats.clone()
    }

    pub fn reader(&self) -> crate::FrameReader {
        self.buffer.reader()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn start_capture(&self) -> Result<CaptureTaskHandle, CaptureError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(CaptureError::AlreadyRunning);
        }
        let cancel = self.session.child_token();
        let thread = {
            let cancel = cancel.clone();
            let camera = self.camera.clone();
            let buffer = self.buffer.clone();
            let stats = self.stats.clone();
            let interval = self.interval;
            std::thread::Builder::new()
                .name("curi-capture".to_string())
                .spawn(move || capture_loop(camera, buffer, stats, interval, cancel))
        };
        let thread = match thread {
            Ok(t) => t,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(CaptureError::Spawn(e.to_string()));
            }
        };
        self.stats.starts.fetch_add(1, Ordering::SeqCst);
        info!(interval_ms = self.interval.as_millis() as u64, "capture started");
        Ok(CaptureTaskHandle {
            cancel,
            thread: Some(thread),
            running: self.running.clone(),
            stats: self.stats.clone(),
        })
    }

    pub fn stop_capture(&self, mut handle: CaptureTaskHandle) {
        handle.shutdown();
    }
}

fn capture_loop(
    camera: SharedCamera,
    buffer: Arc<FrameBuffer>,
    stats: Arc<CaptureStats>,
    interval: Duration,
    cancel: CancellationToken,
) {
    while !cancel.is_cancelled() {
        let read = camera.lock().read();
        match read {
            Ok(frame) => {
                buffer.publish(frame);
                stats.frames.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                stats.read_errors.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "camera read failed");
            }
        }
        std::thread::park_timeout(interval);
    }
    debug!("capture loop exited");
}

impl CaptureTaskHandle {
    fn shutdown(&mut self) -> bool {
        let Some(thread) = self.thread.take() else {
            return false;
        };
        self.cancel.cancel();
        thread.thread().unpark();
        if thread.join().is_err() {
            warn!("capture thread panicked");
        }
        self.running.store(false, Ordering::SeqCst);
        self.stats.stops.fetch_add(1, Ordering::SeqCst);
        info!("capture stopped");
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for CaptureTaskHandle {
    fn drop(&mut self) {
        if self.shutdown() {
            debug!("capture handle dropped without explicit stop");
        }
    }
}
