//! # Common Components
//!
//! Shared building blocks used by the session client.
//!
//! ## Modules
//!
//! - [`messages`]: Protocol message definitions exchanged with the verifier
//! - [`connection`]: WebSocket channel abstraction and connector
//! - [`config`]: Configuration parsing utilities

pub mod messages;
pub mod connection;
pub mod config;
