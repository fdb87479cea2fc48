//! # Session State Machine
//!
//! The authoritative model of verification progress. Inbound verifier updates,
//! connection transitions, capture transitions and restarts are reduced here
//! into a single [`SessionState`]; presentation only ever sees clones of it.
//!
//! ## Completion edge
//!
//! The verifier keeps pushing updates after it reports completion. A side
//! latch, separate from `is_complete`, distinguishes the first completion
//! update (which freezes `completion_time`) from steady-state re-confirmations
//! (which must leave it alone). Restart and any below-threshold update re-arm
//! the latch.
//!
//! ## Phases
//!
//! ```text
//! Idle --begin--> Connecting --first open--> Active(0..4) --step>=5--> Complete
//!                                   ^                                     |
//!                                   +---------------restart---------------+
//! ```
//! Connection status is an orthogonal axis: losing the channel never resets
//! step progress.

use log::{debug, info};
use serde::Serialize;
use uuid::Uuid;

use super::instructions::STEP_COUNT;
use crate::capture::CaptureError;
use crate::common::messages::ServerUpdate;

/// User-facing message recorded when the channel fails.
pub const TRANSPORT_ERROR_MESSAGE: &str = "Connection error. Check if server is running.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionStatus {
    Disconnected,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionPhase {
    /// Session created but not started
    Idle,
    /// Started, no channel has opened yet
    Connecting,
    /// Working through the steps
    Active,
    /// The verifier reported completion
    Complete,
}

/// Snapshot of one verification session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    pub session_id: Uuid,
    pub phase: SessionPhase,
    /// Always a valid index into the instruction sequence
    pub current_step_index: usize,
    pub is_complete: bool,
    pub connection_status: ConnectionStatus,
    pub face_detected: bool,
    /// Degrees
    pub head_yaw: f64,
    /// Seconds, as last reported by the verifier
    pub elapsed_time: f64,
    /// Seconds, frozen at the completion edge
    pub completion_time: f64,
    pub last_error: Option<String>,
    /// The capture source has produced at least one frame
    pub camera_ready: bool,
    /// Persistent capture failure, cleared by a successful retry
    pub camera_error: Option<String>,
}

impl SessionState {
    fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            phase: SessionPhase::Idle,
            current_step_index: 0,
            is_complete: false,
            connection_status: ConnectionStatus::Disconnected,
            face_detected: true,
            head_yaw: 0.0,
            elapsed_time: 0.0,
            completion_time: 0.0,
            last_error: None,
            camera_ready: false,
            camera_error: None,
        }
    }

    /// Progress in percent, derived from the step index and completion flag.
    pub fn progress_percent(&self) -> f64 {
        if self.is_complete {
            100.0
        } else {
            100.0 * self.current_step_index as f64 / STEP_COUNT as f64
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection_status == ConnectionStatus::Connected
    }
}

/// What an inbound update did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Below the completion threshold
    Progress,
    /// First update at or above the threshold since the latch was armed
    CompletionEdge,
    /// Re-confirmation of an already observed completion
    SteadyComplete,
}

/// Reducer owning the session state and its completion latch.
#[derive(Debug)]
pub struct SessionStateMachine {
    state: SessionState,
    completion_latch: bool,
    started: bool,
    has_connected: bool,
}

impl SessionStateMachine {
    pub fn new(session_id: Uuid) -> Self {
        Self {
            state: SessionState::new(session_id),
            completion_latch: false,
            started: false,
            has_connected: false,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.clone()
    }

    pub fn is_complete(&self) -> bool {
        self.state.is_complete
    }

    /// Idle -> Connecting.
    pub fn begin(&mut self) {
        self.started = true;
        self.sync_phase();
    }

    /// Reduce one inbound verifier update.
    pub fn apply_update(&mut self, update: &ServerUpdate) -> UpdateOutcome {
        let step = update.step();
        let complete = step >= STEP_COUNT as i64;

        let outcome = if complete && !self.completion_latch {
            self.completion_latch = true;
            self.state.is_complete = true;
            self.state.current_step_index = clamp_step(step);
            self.state.elapsed_time = update.elapsed();
            self.state.completion_time = update.elapsed();
            self.apply_signals(update);
            info!(
                "✅ Session {} verified in {:.1}s",
                self.state.session_id, self.state.completion_time
            );
            UpdateOutcome::CompletionEdge
        } else if !complete {
            self.completion_latch = false;
            self.state.is_complete = false;
            self.state.current_step_index = clamp_step(step);
            self.state.elapsed_time = update.elapsed();
            self.apply_signals(update);
            UpdateOutcome::Progress
        } else {
            self.apply_signals(update);
            UpdateOutcome::SteadyComplete
        };

        if let Some(error) = update.error_message() {
            debug!("Verifier reported error: {}", error);
        }
        self.sync_phase();
        outcome
    }

    /// Fields every update refreshes, whatever its step.
    fn apply_signals(&mut self, update: &ServerUpdate) {
        self.state.face_detected = update.face_detected();
        self.state.head_yaw = update.head_yaw();
        self.state.last_error = update.error_message().map(str::to_string);
    }

    /// A channel finished its handshake.
    pub fn connection_opened(&mut self) {
        self.state.connection_status = ConnectionStatus::Connected;
        self.state.last_error = None;
        self.has_connected = true;
        self.sync_phase();
    }

    /// The channel closed. Step progress is deliberately left untouched.
    pub fn connection_lost(&mut self, failed: bool) {
        self.state.connection_status = ConnectionStatus::Disconnected;
        if failed {
            self.state.last_error = Some(TRANSPORT_ERROR_MESSAGE.to_string());
        }
    }

    /// Reset progress locally and re-arm the completion edge.
    pub fn restart(&mut self) {
        self.completion_latch = false;
        self.state.current_step_index = 0;
        self.state.is_complete = false;
        self.state.completion_time = 0.0;
        self.state.last_error = None;
        self.sync_phase();
    }

    pub fn camera_failed(&mut self, error: &CaptureError) {
        self.state.camera_ready = false;
        self.state.camera_error = Some(error.user_message().to_string());
    }

    pub fn camera_acquired(&mut self) {
        self.state.camera_error = None;
    }

    /// Returns true when this is the first frame seen since acquisition.
    pub fn camera_frame_seen(&mut self) -> bool {
        let first = !self.state.camera_ready;
        self.state.camera_ready = true;
        first
    }

    pub fn camera_released(&mut self) {
        self.state.camera_ready = false;
    }

    fn sync_phase(&mut self) {
        self.state.phase = if !self.started {
            SessionPhase::Idle
        } else if self.state.is_complete {
            SessionPhase::Complete
        } else if !self.has_connected {
            SessionPhase::Connecting
        } else {
            SessionPhase::Active
        };
    }
}

/// Map a reported step onto a valid instruction index (fallback 0).
fn clamp_step(step: i64) -> usize {
    if (0..STEP_COUNT as i64).contains(&step) {
        step as usize
    } else {
        0
    }
}
