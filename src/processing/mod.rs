//! # Frame Processing
//!
//! This module turns captured frames into verifier payloads (JPEG data URLs).

pub mod encoding;

// Re-export main functions for convenience
pub use encoding::{encode_data_url, encode_jpeg, DATA_URL_PREFIX};
