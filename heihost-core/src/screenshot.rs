//! The single-slot "latest screenshot" handoff.
//!
//! One capture task publishes, any number of connection handlers read.
//! The slot holds an `Arc`, so a reader takes a complete snapshot by
//! cloning the reference and never holds the slot while the pipeline
//! runs.

use std::sync::Arc;

use image::DynamicImage;
use tokio::sync::watch;

/// Read-only access to the most recent capture.
pub trait ScreenshotSource: Send + Sync + 'static {
    /// The latest captured image, or `None` before the first capture.
    fn latest_screenshot(&self) -> Option<Arc<DynamicImage>>;
}

/// Writer half, owned by the capture task.
#[derive(Debug)]
pub struct ScreenshotPublisher {
    tx: watch::Sender<Option<Arc<DynamicImage>>>,
}

/// Cloneable reader half, handed to the server.
#[derive(Debug, Clone)]
pub struct ScreenshotSlot {
    rx: watch::Receiver<Option<Arc<DynamicImage>>>,
}

/// Create an empty slot.
pub fn channel() -> (ScreenshotPublisher, ScreenshotSlot) {
    let (tx, rx) = watch::channel(None);
    (ScreenshotPublisher { tx }, ScreenshotSlot { rx })
}

impl ScreenshotPublisher {
    /// Replace the current screenshot.
    ///
    /// Succeeds even when no reader is left.
    pub fn publish(&self, image: DynamicImage) {
        self.tx.send_replace(Some(Arc::new(image)));
    }
}

impl ScreenshotSlot {
    /// Snapshot the current reference.
    pub fn latest(&self) -> Option<Arc<DynamicImage>> {
        self.rx.borrow().clone()
    }

    /// A slot that already holds `image` and has no publisher.
    pub fn fixed(image: DynamicImage) -> Self {
        let (_tx, rx) = watch::channel(Some(Arc::new(image)));
        Self { rx }
    }

    /// A slot that stays empty forever.
    pub fn empty() -> Self {
        let (_tx, rx) = watch::channel(None);
        Self { rx }
    }
}

impl ScreenshotSource for ScreenshotSlot {
    fn latest_screenshot(&self) -> Option<Arc<DynamicImage>> {
        self.latest()
    }
}
