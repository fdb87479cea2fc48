//! # Session Client
//!
//! The client is split into a pure core and an async coordinator:
//!
//! ## Core ([`state`], [`instructions`])
//! Reduces verifier updates, connection changes and restarts into a single
//! [`SessionState`]. No I/O happens here.
//!
//! ## Session Middleware ([`middleware`])
//! Owns the event loop and all coordination concerns:
//! - Channel lifecycle and stale-event filtering
//! - Reconnection after every close ([`supervisor`])
//! - Frame sampling on a fixed cadence ([`sampler`])
//! - Restart, capture retry and teardown
//! - Session counters ([`metrics`])
//!
//! ## Presentation ([`view`])
//! Labels and flags derived from a state snapshot.

pub mod instructions;
pub mod metrics;
pub mod middleware;
pub mod sampler;
pub mod state;
pub mod supervisor;
pub mod view;

// Re-export for convenience
pub use metrics::{SessionMetrics, SessionStats};
pub use middleware::{spawn_session, SessionCommand, SessionHandle, SessionMiddleware};
pub use state::{ConnectionStatus, SessionPhase, SessionState, SessionStateMachine};
pub use view::SessionView;
