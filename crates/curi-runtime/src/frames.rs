//! Single-slot latest-frame buffer between the capture thread and the round loop.

use camera_geometry::RgbdFrame;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

type Slot = Option<Arc<RgbdFrame>>;

/// Writer side. Not `Clone`: there is exactly one publisher.
#[derive(Debug)]
pub struct FrameBuffer {
    tx: watch::Sender<Slot>,
}

/// Reader side; cheap to clone, always sees the most recently completed frame.
#[derive(Debug, Clone)]
pub struct FrameReader {
    rx: watch::Receiver<Slot>,
}

impl FrameBuffer {
    pub fn channel() -> (FrameBuffer, FrameReader) {
        let (tx, rx) = watch::channel(None);
        (FrameBuffer { tx }, FrameReader { rx })
    }

    /// Swap in a whole new frame; readers never observe a partial one.
    pub fn publish(&self, frame: RgbdFrame) {
        self.tx.send_replace(Some(Arc::new(frame)));
    }

    pub fn reader(&self) -> FrameReader {
        FrameReader {
            rx: self.tx.subscribe(),
        }
    }
}

impl FrameReader {
    pub fn latest(&self) -> Option<Arc<RgbdFrame>> {
        self.rx.borrow().clone()
    }

    /// Latest frame, waiting up to `timeout` for the first one.
    pub async fn wait_for_frame(&mut self, timeout: Duration) -> Option<Arc<RgbdFrame>> {
        if let Some(frame) = self.latest() {
            return Some(frame);
        }
        let waited = tokio::time::timeout(timeout, self.rx.wait_for(Option::is_some)).await;
        match waited {
            Ok(Ok(slot)) => slot.clone(),
            _ => None,
        }
    }
}
