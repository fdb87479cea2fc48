//! # Frame Sampler
//!
//! Pulls the current frame from the capture source on a fixed cadence and
//! forwards it to the verifier channel as a `process_frame` message.
//!
//! Each tick is gated: nothing is captured or sent while the session is
//! complete or disconnected, and nothing is sent until the source produces a
//! non-empty frame. Gated ticks are silent skips, not errors. Encoding and
//! send failures are logged and absorbed so one bad frame never ends the
//! session. The sampler keeps ticking while gated, so a restart resumes
//! sending without re-acquiring the camera.

use log::{debug, error, info, warn};

use crate::capture::{CaptureError, CaptureSource};
use crate::common::config::SamplerConfig;
use crate::common::connection::{ChannelHandle, SendStatus};
use crate::common::messages::ClientMessage;
use crate::processing::encoding;

/// Why a tick did not send a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// The capture source is not acquired or has no frame yet
    CaptureNotReady,
    /// The frame has zero width or height
    EmptyFrame,
    /// No open channel
    Disconnected,
    /// Verification is complete
    Complete,
    /// The outbound queue is full
    Backpressure,
    /// The encoded payload is implausibly small
    UndersizedPayload,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::CaptureNotReady => "capture_not_ready",
            SkipReason::EmptyFrame => "empty_frame",
            SkipReason::Disconnected => "disconnected",
            SkipReason::Complete => "complete",
            SkipReason::Backpressure => "backpressure",
            SkipReason::UndersizedPayload => "undersized_payload",
        }
    }
}

/// Result of one sampler tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Sent,
    Skipped(SkipReason),
    /// Encoding or queueing failed; logged and absorbed
    Failed,
}

/// Per-tick view of the session the sampler needs for gating.
pub struct TickContext<'a> {
    /// The open channel, if the session is connected
    pub channel: Option<&'a ChannelHandle>,
    pub is_complete: bool,
}

pub struct FrameSampler {
    source: Box<dyn CaptureSource>,
    settings: SamplerConfig,
    acquired: bool,
    frame_seen: bool,
}

impl FrameSampler {
    pub fn new(source: Box<dyn CaptureSource>, settings: SamplerConfig) -> Self {
        Self {
            source,
            settings,
            acquired: false,
            frame_seen: false,
        }
    }

    /// Acquire the capture source. A failure leaves the sampler idle.
    pub fn acquire(&mut self) -> Result<(), CaptureError> {
        match self.source.acquire() {
            Ok(()) => {
                info!("📷 Capture source ready: {}", self.source.describe());
                self.acquired = true;
                self.frame_seen = false;
                Ok(())
            }
            Err(e) => {
                error!("❌ Capture source {} unavailable: {}", self.source.describe(), e);
                self.acquired = false;
                Err(e)
            }
        }
    }

    /// Stop the camera. Safe to call repeatedly.
    pub fn release(&mut self) {
        if self.acquired {
            info!("Releasing capture source {}", self.source.describe());
        }
        self.source.release();
        self.acquired = false;
        self.frame_seen = false;
    }

    pub fn is_acquired(&self) -> bool {
        self.acquired
    }

    /// True once the source has produced a non-empty frame since acquisition.
    pub fn is_ready(&self) -> bool {
        self.frame_seen
    }

    /// Run one capture-and-send step.
    pub fn tick(&mut self, ctx: TickContext<'_>) -> TickOutcome {
        if !self.acquired {
            return TickOutcome::Skipped(SkipReason::CaptureNotReady);
        }
        if ctx.is_complete {
            return TickOutcome::Skipped(SkipReason::Complete);
        }

        let Some(frame) = self.source.current_frame() else {
            return TickOutcome::Skipped(SkipReason::CaptureNotReady);
        };
        if frame.is_empty() {
            return TickOutcome::Skipped(SkipReason::EmptyFrame);
        }
        self.frame_seen = true;

        let Some(channel) = ctx.channel else {
            return TickOutcome::Skipped(SkipReason::Disconnected);
        };

        let data_url = match encoding::encode_data_url(&frame, self.settings.jpeg_quality) {
            Ok(url) => url,
            Err(e) => {
                warn!("Frame encoding failed: {}", e);
                return TickOutcome::Failed;
            }
        };
        if data_url.len() < self.settings.min_payload_len {
            return TickOutcome::Skipped(SkipReason::UndersizedPayload);
        }

        let text = match (ClientMessage::ProcessFrame { frame: data_url }).to_text() {
            Ok(text) => text,
            Err(e) => {
                warn!("Frame serialization failed: {}", e);
                return TickOutcome::Failed;
            }
        };

        match channel.try_send(text) {
            SendStatus::Queued => {
                debug!("📤 Frame {}x{} queued", frame.width(), frame.height());
                TickOutcome::Sent
            }
            SendStatus::Full => TickOutcome::Skipped(SkipReason::Backpressure),
            SendStatus::Closed => {
                warn!("Frame dropped: channel task has exited");
                TickOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::SyntheticSource;
    use crate::common::connection::ChannelCommand;
    use tokio::sync::mpsc;

    fn sampler(source: SyntheticSource) -> FrameSampler {
        FrameSampler::new(Box::new(source), SamplerConfig::default())
    }

    fn channel(capacity: usize) -> (ChannelHandle, mpsc::Receiver<ChannelCommand>) {
        let (tx, rx) = mpsc::channel(capacity);
        (ChannelHandle::new(tx), rx)
    }

    fn open(handle: &ChannelHandle) -> TickContext<'_> {
        TickContext {
            channel: Some(handle),
            is_complete: false,
        }
    }

    #[test]
    fn test_sends_process_frame_when_open() {
        let mut sampler = sampler(SyntheticSource::new(64, 48));
        sampler.acquire().unwrap();
        let (handle, mut rx) = channel(4);

        let outcome = sampler.tick(open(&handle));
        assert_eq!(outcome, TickOutcome::Sent);
        assert!(sampler.is_ready());

        let ChannelCommand::Send(text) = rx.try_recv().unwrap() else {
            panic!("expected a frame");
        };
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["action"], "process_frame");
        assert!(value["frame"]
            .as_str()
            .unwrap()
            .starts_with(encoding::DATA_URL_PREFIX));
    }

    #[test]
    fn test_gates_skip_silently() {
        let mut sampler = sampler(SyntheticSource::new(64, 48));
        let (handle, mut rx) = channel(4);

        // Not acquired
        let outcome = sampler.tick(open(&handle));
        assert_eq!(outcome, TickOutcome::Skipped(SkipReason::CaptureNotReady));

        sampler.acquire().unwrap();

        let outcome = sampler.tick(TickContext {
            channel: None,
            is_complete: false,
        });
        assert_eq!(outcome, TickOutcome::Skipped(SkipReason::Disconnected));

        let outcome = sampler.tick(TickContext {
            channel: Some(&handle),
            is_complete: true,
        });
        assert_eq!(outcome, TickOutcome::Skipped(SkipReason::Complete));

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_warming_and_empty_sources_skip() {
        let (handle, _rx) = channel(4);

        let mut warming = sampler(SyntheticSource::new(64, 48).with_warmup(1));
        warming.acquire().unwrap();
        let outcome = warming.tick(open(&handle));
        assert_eq!(outcome, TickOutcome::Skipped(SkipReason::CaptureNotReady));
        assert!(!warming.is_ready());

        let mut empty = sampler(SyntheticSource::new(0, 0));
        empty.acquire().unwrap();
        let outcome = empty.tick(open(&handle));
        assert_eq!(outcome, TickOutcome::Skipped(SkipReason::EmptyFrame));
    }

    #[test]
    fn test_full_queue_is_backpressure() {
        let mut sampler = sampler(SyntheticSource::new(32, 32));
        sampler.acquire().unwrap();
        let (handle, _rx) = channel(1);

        assert_eq!(sampler.tick(open(&handle)), TickOutcome::Sent);
        assert_eq!(
            sampler.tick(open(&handle)),
            TickOutcome::Skipped(SkipReason::Backpressure)
        );
    }

    #[test]
    fn test_closed_channel_is_absorbed() {
        let mut sampler = sampler(SyntheticSource::new(32, 32));
        sampler.acquire().unwrap();
        let (handle, rx) = channel(1);
        drop(rx);

        let outcome = sampler.tick(open(&handle));
        assert_eq!(outcome, TickOutcome::Failed);

        // The sampler keeps working afterwards
        let (handle, _rx) = channel(1);
        let outcome = sampler.tick(open(&handle));
        assert_eq!(outcome, TickOutcome::Sent);
    }

    #[test]
    fn test_failed_acquire_leaves_sampler_idle() {
        let mut sampler = sampler(SyntheticSource::unavailable(CaptureError::NoDevice));
        assert_eq!(sampler.acquire(), Err(CaptureError::NoDevice));
        assert!(!sampler.is_acquired());
    }
}
