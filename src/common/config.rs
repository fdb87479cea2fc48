//! # Configuration Utilities
//!
//! TOML configuration for a verification session. Every field has a default,
//! so an empty file (or no file at all) yields a working local setup.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Default verifier endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:5000/ws";

/// Load a TOML configuration file and deserialize it into the specified type.
///
/// # Arguments
/// - `path`: Path to the TOML configuration file
///
/// # Returns
/// - `Ok(T)`: Successfully loaded and parsed configuration
/// - `Err`: File I/O or parsing error
///
/// # Example
/// ```ignore
/// let config: SessionConfig = load_config("config/session.toml")?;
/// ```
pub fn load_config<T>(path: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let content = fs::read_to_string(path)?;
    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Complete configuration for one verification session.
///
/// # Example TOML
///
/// ```toml
/// [session]
/// endpoint = "ws://localhost:5000/ws"
/// connect_timeout_ms = 10000
///
/// [sampler]
/// interval_ms = 100
/// jpeg_quality = 80
///
/// [reconnect]
/// delay_ms = 3000
///
/// [capture]
/// source = "directory"
/// path = "user-data/frames"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Verifier connection settings
    pub session: EndpointConfig,
    /// Frame sampling cadence and encoding
    pub sampler: SamplerConfig,
    /// Reconnection policy
    pub reconnect: ReconnectConfig,
    /// Which capture source to use
    pub capture: CaptureConfig,
}

impl SessionConfig {
    /// Loads session configuration from a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        load_config(path)
    }
}

/// Verifier endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// WebSocket URL of the verifier (e.g., "ws://localhost:5000/ws")
    pub endpoint: String,
    /// Upper bound on one connection attempt, handshake included (milliseconds)
    pub connect_timeout_ms: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            connect_timeout_ms: 10_000,
        }
    }
}

impl EndpointConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms.max(1))
    }
}

/// Frame sampler settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Period between capture-and-send ticks (milliseconds)
    pub interval_ms: u64,
    /// JPEG quality, 1-100
    pub jpeg_quality: u8,
    /// Outbound frames that may wait in a channel queue before ticks are skipped
    pub max_pending_frames: usize,
    /// Encoded data URLs shorter than this are treated as invalid frames
    pub min_payload_len: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            jpeg_quality: 80,
            max_pending_frames: 4,
            min_payload_len: 100,
        }
    }
}

impl SamplerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

/// Reconnection policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Delay before reopening a closed channel (milliseconds)
    pub delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self { delay_ms: 3000 }
    }
}

impl ReconnectConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Kind of capture source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Generated test pattern
    #[default]
    Synthetic,
    /// Still images cycled from a directory
    Directory,
}

/// Capture source selection and preferred frame size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub source: SourceKind,
    /// Image directory for the `directory` source
    pub path: Option<PathBuf>,
    /// Preferred frame width in pixels
    pub width: u32,
    /// Preferred frame height in pixels
    pub height: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Synthetic,
            path: None,
            width: 640,
            height: 480,
        }
    }
}
