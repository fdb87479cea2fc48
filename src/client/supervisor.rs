//! # Reconnection Supervisor
//!
//! Owns the retry policy for the verifier channel: every close, clean or not,
//! schedules exactly one new attempt after a fixed delay. There is no give-up
//! state. The only exception is a caller-initiated teardown, which is flagged
//! as intentional before the channel is closed.

use log::info;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
pub struct ReconnectSupervisor {
    delay: Duration,
    deadline: Option<Instant>,
    intentional_close: bool,
    attempts: u64,
}

impl ReconnectSupervisor {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
            intentional_close: false,
            attempts: 0,
        }
    }

    /// Record a channel close. Returns true when a retry was scheduled.
    ///
    /// A pending retry is never pushed back or duplicated.
    pub fn on_closed(&mut self, now: Instant) -> bool {
        if self.intentional_close {
            return false;
        }
        if self.deadline.is_some() {
            return false;
        }
        self.deadline = Some(now + self.delay);
        info!("🔄 Reconnecting in {}ms", self.delay.as_millis());
        true
    }

    /// When the next attempt is due, if one is scheduled.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Consume the scheduled attempt if it is due. Returns true when the
    /// caller should open a new channel now.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now && !self.intentional_close => {
                self.deadline = None;
                self.attempts += 1;
                true
            }
            _ => false,
        }
    }

    /// Flag the upcoming close as caller-initiated and cancel any pending retry.
    pub fn mark_intentional(&mut self) {
        self.intentional_close = true;
        self.deadline = None;
    }

    /// Number of reconnection attempts started so far.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }
}
