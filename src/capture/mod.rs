//! Frame capture sources.
//!
//! The camera is an external collaborator. This module defines the contract
//! the session relies on and ships two stock sources:
//! - Synthetic test pattern (no hardware, used by tests and demos)
//! - Directory of still images (replays recorded frames)
//!
//! A source is acquired once, polled for its current frame by the sampler,
//! and released at teardown. A failed acquisition is not fatal: the sampler
//! stays idle until the caller retries.

pub mod directory;
pub mod synthetic;

pub use directory::DirectorySource;
pub use synthetic::SyntheticSource;

use image::RgbImage;
use thiserror::Error;

/// Why a capture source could not be acquired.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("permission denied")]
    PermissionDenied,
    #[error("no device")]
    NoDevice,
}

impl CaptureError {
    /// Message shown to the user until capture is retried successfully.
    pub fn user_message(&self) -> &'static str {
        match self {
            CaptureError::PermissionDenied => {
                "Camera access denied. Please allow camera permissions."
            }
            CaptureError::NoDevice => "No camera device found. Please connect a camera.",
        }
    }
}

/// One captured frame as 8-bit RGB pixels.
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// True when the frame has no pixels, e.g. before the device negotiated a size.
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }
}

/// Contract for anything that can feed live frames to the sampler.
pub trait CaptureSource: Send {
    /// Start capturing. Called at session start and on explicit retry.
    fn acquire(&mut self) -> Result<(), CaptureError>;

    /// The current frame, or `None` when no frame is available yet.
    fn current_frame(&mut self) -> Option<Frame>;

    /// Stop capturing and release the device. Must be idempotent.
    fn release(&mut self);

    /// Human-readable name for logs.
    fn describe(&self) -> String;
}
