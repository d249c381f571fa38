//! File-backed screenshot capture.
//!
//! Stands in for a browser-driven capture loop: every cycle reads the
//! configured image file, fits it to the configured viewport and
//! publishes it as the latest screenshot. Failed cycles are logged and
//! leave the previous screenshot in place.

use std::path::{Path, PathBuf};
use std::time::Duration;

use image::{DynamicImage, GenericImageView, imageops};
use thiserror::Error;
use tracing::{error, info};

use heihost_core::ScreenshotPublisher;

use crate::config::CaptureConfig;

/// Why a capture cycle produced nothing.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("cannot read {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("capture task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Read `path` and fit it to `width x height`.
///
/// Larger images are cropped from the top-left corner; smaller ones are
/// padded with black.
pub fn load_screenshot(path: &Path, width: u32, height: u32) -> Result<DynamicImage, CaptureError> {
    let source = image::open(path).map_err(|source| CaptureError::Load {
        path: path.to_path_buf(),
        source,
    })?;

    let cropped = source.crop_imm(0, 0, width, height);
    if cropped.dimensions() == (width, height) {
        return Ok(cropped);
    }

    let mut canvas = DynamicImage::new_rgb8(width, height);
    imageops::replace(&mut canvas, &cropped, 0, 0);
    Ok(canvas)
}

// ── FileCapture ──────────────────────────────────────────────────

/// Periodic capture task.
pub struct FileCapture {
    source: PathBuf,
    width: u32,
    height: u32,
    interval: Option<Duration>,
    publisher: ScreenshotPublisher,
    total: u64,
}

impl FileCapture {
    pub fn new(config: &CaptureConfig, publisher: ScreenshotPublisher) -> Self {
        Self {
            source: config.source.clone(),
            width: config.width,
            height: config.height,
            interval: config.interval(),
            publisher,
            total: 0,
        }
    }

    /// Take one screenshot and publish it.
    pub async fn capture_once(&mut self) -> Result<(), CaptureError> {
        let (path, width, height) = (self.source.clone(), self.width, self.height);
        let image =
            tokio::task::spawn_blocking(move || load_screenshot(&path, width, height)).await??;

        self.publisher.publish(image);
        self.total += 1;
        info!("screenshot #{} captured from {}", self.total, self.source.display());
        Ok(())
    }

    /// Capture once, or forever on the configured interval.
    pub async fn run(mut self) {
        let Some(period) = self.interval else {
            if let Err(e) = self.capture_once().await {
                error!("screen capture failed: {e}");
            }
            return;
        };

        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            if let Err(e) = self.capture_once().await {
                error!("screen capture failed: {e}");
            }
        }
    }

    /// Number of successful captures so far.
    pub fn total(&self) -> u64 {
        self.total
    }
}

// ── Tests ────────────────────────────────────────────────────────
