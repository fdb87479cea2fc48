use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Instant;

use super::sampler::{SkipReason, TickOutcome};

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub ticks: u64,
    pub frames_sent: u64,
    pub frame_failures: u64,
    pub frames_skipped: u64,

    // Skipped ticks broken down by gate
    pub skip_reasons: HashMap<String, u64>,

    pub messages_received: u64,
    pub messages_dropped: u64,

    pub connections_opened: u64,
    pub disconnects: u64,
    pub transport_errors: u64,
    pub reconnect_attempts: u64,

    pub restarts: u64,
    pub completions: u64,
    pub last_completion_secs: Option<f64>,
}

#[derive(Debug)]
pub struct SessionMetrics {
    session_id: String,
    start_time: Instant,
    started_at: String,
    stats: SessionStats,
}

impl SessionMetrics {
    pub fn new(session_id: String) -> Self {
        Self {
            session_id,
            start_time: Instant::now(),
            started_at: chrono::Local::now().to_rfc3339(),
            stats: SessionStats::default(),
        }
    }

    pub fn record_tick(&mut self, outcome: TickOutcome) {
        self.stats.ticks += 1;
        match outcome {
            TickOutcome::Sent => self.stats.frames_sent += 1,
            TickOutcome::Failed => self.stats.frame_failures += 1,
            TickOutcome::Skipped(reason) => self.record_skip(reason),
        }
    }

    fn record_skip(&mut self, reason: SkipReason) {
        self.stats.frames_skipped += 1;
        *self
            .stats
            .skip_reasons
            .entry(reason.as_str().to_string())
            .or_insert(0) += 1;
    }

    pub fn record_message(&mut self, applied: bool) {
        if applied {
            self.stats.messages_received += 1;
        } else {
            self.stats.messages_dropped += 1;
        }
    }

    pub fn record_connected(&mut self) {
        self.stats.connections_opened += 1;
    }

    pub fn record_disconnect(&mut self, failed: bool) {
        self.stats.disconnects += 1;
        if failed {
            self.stats.transport_errors += 1;
        }
    }

    pub fn record_reconnect_attempt(&mut self) {
        self.stats.reconnect_attempts += 1;
    }

    pub fn record_restart(&mut self) {
        self.stats.restarts += 1;
    }

    pub fn record_completion(&mut self, completion_secs: f64) {
        self.stats.completions += 1;
        self.stats.last_completion_secs = Some(completion_secs);
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn export_to_json<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let output = serde_json::json!({
            "session_id": self.session_id,
            "started_at": self.started_at,
            "session_duration_secs": self.start_time.elapsed().as_secs_f64(),
            "stats": self.stats,
        });

        let json_string = serde_json::to_string_pretty(&output)?;
        let mut file = File::create(path)?;
        file.write_all(json_string.as_bytes())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_accounting() {
        let mut metrics = SessionMetrics::new("test-session".to_string());

        metrics.record_tick(TickOutcome::Sent);
        metrics.record_tick(TickOutcome::Sent);
        metrics.record_tick(TickOutcome::Failed);
        metrics.record_tick(TickOutcome::Skipped(SkipReason::Complete));
        metrics.record_tick(TickOutcome::Skipped(SkipReason::Complete));
        metrics.record_tick(TickOutcome::Skipped(SkipReason::Disconnected));

        let stats = metrics.stats();
        assert_eq!(stats.ticks, 6);
        assert_eq!(stats.frames_sent, 2);
        assert_eq!(stats.frame_failures, 1);
        assert_eq!(stats.frames_skipped, 3);
        assert_eq!(stats.skip_reasons.get("complete"), Some(&2));
        assert_eq!(stats.skip_reasons.get("disconnected"), Some(&1));
    }

    #[test]
    fn test_export_to_json() {
        let mut metrics = SessionMetrics::new("test-session".to_string());
        metrics.record_connected();
        metrics.record_disconnect(true);
        metrics.record_completion(12.3);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        metrics.export_to_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["session_id"], "test-session");
        assert_eq!(value["stats"]["transport_errors"], 1);
        assert_eq!(value["stats"]["last_completion_secs"], 12.3);
    }
}
