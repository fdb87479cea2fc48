//! # Message Protocol
//!
//! Defines the JSON records exchanged with the remote verifier over the
//! WebSocket channel:
//! - Outbound: sampled camera frames and restart requests
//! - Inbound: step/progress updates pushed by the verifier
//!
//! One JSON object is carried per WebSocket text frame. The protocol has no
//! acknowledgments or sequence numbers; delivery order is arrival order.

use serde::{Deserialize, Serialize};

// ============================================================================
// OUTBOUND MESSAGES - client to verifier
// ============================================================================

/// Messages sent by the client to the verifier.
///
/// Serialized with an `action` tag, e.g. `{"action":"restart"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientMessage {
    /// **Process Frame**
    ///
    /// One sampled camera frame, sent at sampler cadence.
    ///
    /// # Fields
    /// - `frame`: JPEG image encoded as a data URL (`data:image/jpeg;base64,...`)
    ProcessFrame { frame: String },

    /// **Restart**
    ///
    /// Asks the verifier to reset its step counter for this connection.
    Restart,
}

impl ClientMessage {
    /// Serialize a message to the JSON text carried in one WebSocket frame.
    ///
    /// # Example
    /// ```ignore
    /// let text = ClientMessage::Restart.to_text()?;
    /// assert_eq!(text, r#"{"action":"restart"}"#);
    /// ```
    pub fn to_text(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// INBOUND MESSAGES - verifier to client
// ============================================================================

/// One progress update pushed by the verifier.
///
/// Every field is optional on the wire; the accessors apply the defaults the
/// client relies on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerUpdate {
    /// Reported step, 0-based. Values >= 5 signal overall completion.
    /// Some verifiers send it as a float (`5.0`), so it is kept as one.
    #[serde(default)]
    pub state: Option<f64>,
    /// Seconds elapsed in the current attempt.
    #[serde(default)]
    pub total_time: Option<f64>,
    /// Head-turn angle in degrees.
    #[serde(default)]
    pub yaw: Option<f64>,
    /// Whether the verifier currently sees a face.
    #[serde(default)]
    pub face_detected: Option<bool>,
    /// Application-level error reported by the verifier.
    #[serde(default)]
    pub error: Option<String>,
}

impl ServerUpdate {
    /// Parse an update from the text of one WebSocket frame.
    ///
    /// # Example
    /// ```ignore
    /// let update = ServerUpdate::from_text(r#"{"state":2,"yaw":-14.5}"#)?;
    /// assert_eq!(update.step(), 2);
    /// ```
    pub fn from_text(text: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Reported step, truncated toward zero, treating an absent value as 0.
    pub fn step(&self) -> i64 {
        self.state.map(|state| state.trunc() as i64).unwrap_or(0)
    }

    /// Elapsed seconds, treating an absent value as 0.
    pub fn elapsed(&self) -> f64 {
        self.total_time.unwrap_or(0.0)
    }

    /// Head yaw in degrees, treating an absent value as 0.
    pub fn head_yaw(&self) -> f64 {
        self.yaw.unwrap_or(0.0)
    }

    /// A face counts as detected unless the verifier explicitly says otherwise.
    pub fn face_detected(&self) -> bool {
        self.face_detected != Some(false)
    }

    /// The verifier's error text, ignoring empty strings.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref().filter(|e| !e.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_wire_format() {
        let restart = ClientMessage::Restart.to_text().unwrap();
        assert_eq!(restart, r#"{"action":"restart"}"#);

        let frame = ClientMessage::ProcessFrame {
            frame: "data:image/jpeg;base64,AAAA".to_string(),
        }
        .to_text()
        .unwrap();
        assert_eq!(
            frame,
            r#"{"action":"process_frame","frame":"data:image/jpeg;base64,AAAA"}"#
        );
    }

    #[test]
    fn test_sparse_update_defaults() {
        let update = ServerUpdate::from_text("{}").unwrap();
        assert_eq!(update.step(), 0);
        assert_eq!(update.elapsed(), 0.0);
        assert_eq!(update.head_yaw(), 0.0);
        assert!(update.face_detected());
        assert!(update.error_message().is_none());
    }

    #[test]
    fn test_face_detected_only_false_when_explicit() {
        let hidden = ServerUpdate::from_text(r#"{"state":1,"face_detected":false}"#).unwrap();
        assert!(!hidden.face_detected());

        let null = ServerUpdate::from_text(r#"{"state":1,"face_detected":null}"#).unwrap();
        assert!(null.face_detected());
    }

    #[test]
    fn test_unknown_fields_and_empty_error() {
        let update =
            ServerUpdate::from_text(r#"{"state":3,"error":"","landmarks":[1,2,3]}"#).unwrap();
        assert_eq!(update.step(), 3);
        assert!(update.error_message().is_none());
    }

    #[test]
    fn test_float_step_is_accepted() {
        let update = ServerUpdate::from_text(r#"{"state":5.0,"total_time":12.3}"#).unwrap();
        assert_eq!(update.step(), 5);
        assert_eq!(update.elapsed(), 12.3);

        let partial = ServerUpdate::from_text(r#"{"state":2.7,"face_detected":false}"#).unwrap();
        assert_eq!(partial.step(), 2);
        assert!(!partial.face_detected());
    }

    #[test]
    fn test_rejects_non_object_payload() {
        assert!(ServerUpdate::from_text("not json").is_err());
        assert!(ServerUpdate::from_text(r#"{"state":"two"}"#).is_err());
    }
}
