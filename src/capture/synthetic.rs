//! Synthetic frame source.
//!
//! Produces a moving gradient so successive frames differ, which keeps JPEG
//! payloads realistic without a camera. The source can also simulate a
//! device that is missing or refuses access, and a warm-up period during
//! which no frame is available yet.

use image::{Rgb, RgbImage};

use super::{CaptureError, CaptureSource, Frame};

/// Generated test-pattern source.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    width: u32,
    height: u32,
    /// Polls that return `None` after acquisition before frames flow
    warmup_polls: u32,
    failure: Option<CaptureError>,
    acquired: bool,
    polls_since_acquire: u32,
    frames_produced: u64,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            warmup_polls: 0,
            failure: None,
            acquired: false,
            polls_since_acquire: 0,
            frames_produced: 0,
        }
    }

    /// A source whose acquisition always fails with `error`.
    pub fn unavailable(error: CaptureError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new(640, 480)
        }
    }

    /// Delay the first frame by `polls` calls to `current_frame`.
    pub fn with_warmup(mut self, polls: u32) -> Self {
        self.warmup_polls = polls;
        self
    }

    /// Make a previously failing source succeed on the next acquisition.
    #[cfg(test)]
    pub fn clear_failure(&mut self) {
        self.failure = None;
    }

    #[cfg(test)]
    pub fn is_acquired(&self) -> bool {
        self.acquired
    }

    #[cfg(test)]
    pub fn frames_produced(&self) -> u64 {
        self.frames_produced
    }

    fn render(&self) -> RgbImage {
        let shift = (self.frames_produced % 256) as u32;
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let r = ((x + shift) % 256) as u8;
            let g = ((y + shift / 2) % 256) as u8;
            let b = ((x ^ y) % 256) as u8;
            Rgb([r, g, b])
        })
    }
}

impl CaptureSource for SyntheticSource {
    fn acquire(&mut self) -> Result<(), CaptureError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        self.acquired = true;
        self.polls_since_acquire = 0;
        Ok(())
    }

    fn current_frame(&mut self) -> Option<Frame> {
        if !self.acquired {
            return None;
        }
        if self.polls_since_acquire < self.warmup_polls {
            self.polls_since_acquire += 1;
            return None;
        }
        let frame = Frame::new(self.render());
        self.frames_produced += 1;
        Some(frame)
    }

    fn release(&mut self) {
        self.acquired = false;
    }

    fn describe(&self) -> String {
        format!("synthetic {}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_frames_before_acquire_or_after_release() {
        let mut source = SyntheticSource::new(32, 24);
        assert!(source.current_frame().is_none());

        source.acquire().unwrap();
        let frame = source.current_frame().unwrap();
        assert_eq!((frame.width(), frame.height()), (32, 24));

        source.release();
        assert!(source.current_frame().is_none());
        // Releasing twice is harmless
        source.release();
    }

    #[test]
    fn test_warmup_delays_first_frame() {
        let mut source = SyntheticSource::new(8, 8).with_warmup(2);
        source.acquire().unwrap();
        assert!(source.current_frame().is_none());
        assert!(source.current_frame().is_none());
        assert!(source.current_frame().is_some());
        assert_eq!(source.frames_produced(), 1);
    }

    #[test]
    fn test_unavailable_source_can_recover() {
        let mut source = SyntheticSource::unavailable(CaptureError::PermissionDenied);
        assert_eq!(source.acquire(), Err(CaptureError::PermissionDenied));
        assert!(!source.is_acquired());

        source.clear_failure();
        assert!(source.acquire().is_ok());
        assert!(source.current_frame().is_some());
    }

    #[test]
    fn test_zero_sized_pattern_is_empty() {
        let mut source = SyntheticSource::new(0, 480);
        source.acquire().unwrap();
        assert!(source.current_frame().unwrap().is_empty());
    }
}
