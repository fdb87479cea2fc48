pub mod capture;
pub mod client;
pub mod common;
pub mod processing;

pub use client::{spawn_session, SessionHandle, SessionState, SessionView};
pub use common::config::SessionConfig;
