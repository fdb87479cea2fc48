//! Read-only presentation model derived from a [`SessionState`] snapshot.
//!
//! Presentation layers render these strings and flags; they never reach back
//! into the session except through `restart()`.

use super::instructions::{instruction_for, Instruction, COMPLETE_COLOR, STEP_COUNT};
use super::state::SessionState;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    /// "Step 3 of 5" or "Complete!"
    pub step_label: String,
    /// "40% Complete"
    pub progress_label: String,
    pub progress_percent: f64,
    pub instruction: &'static Instruction,
    /// Progress ring color
    pub ring_color: &'static str,
    /// Completion time once complete, live elapsed time otherwise
    pub elapsed_label: String,
    /// "Completed in 12.3s"
    pub completion_label: String,
    /// "-12°"
    pub yaw_label: String,
    pub status_label: &'static str,
    pub is_connected: bool,
    pub show_completion_overlay: bool,
    pub show_no_face_warning: bool,
    pub error: Option<String>,
}

impl SessionView {
    pub fn from_state(state: &SessionState) -> Self {
        let instruction = instruction_for(state.current_step_index);
        let progress_percent = state.progress_percent();

        let step_label = if state.is_complete {
            "Complete!".to_string()
        } else {
            format!("Step {} of {}", state.current_step_index + 1, STEP_COUNT)
        };

        let shown_time = if state.is_complete {
            state.completion_time
        } else {
            state.elapsed_time
        };

        let status_label = if !state.camera_ready {
            "Initializing camera..."
        } else if !state.is_connected() {
            "Reconnecting to server..."
        } else {
            "Connected"
        };

        // Capture failures persist until retried, so they outrank transient errors.
        let error = state.camera_error.clone().or_else(|| state.last_error.clone());

        Self {
            step_label,
            progress_label: format!("{}% Complete", progress_percent.round() as u32),
            progress_percent,
            instruction,
            ring_color: if state.is_complete {
                COMPLETE_COLOR
            } else {
                instruction.color
            },
            elapsed_label: format!("{:.1}s", shown_time),
            completion_label: format!("Completed in {:.1}s", state.completion_time),
            yaw_label: format!("{:.0}°", state.head_yaw),
            status_label,
            is_connected: state.is_connected() && state.camera_ready,
            show_completion_overlay: state.is_complete,
            show_no_face_warning: !state.face_detected && !state.is_complete && state.camera_ready,
            error,
        }
    }

    /// Single-line rendering for terminals and logs.
    pub fn status_line(&self) -> String {
        let mut line = format!(
            "{} · {} · {} · time {} · yaw {} · {}",
            self.step_label,
            self.progress_label,
            if self.show_completion_overlay {
                self.completion_label.as_str()
            } else {
                self.instruction.text
            },
            self.elapsed_label,
            self.yaw_label,
            self.status_label
        );
        if self.show_no_face_warning {
            line.push_str(" · ⚠️ No Face Detected");
        }
        if let Some(error) = &self.error {
            line.push_str(" · ");
            line.push_str(error);
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::state::SessionStateMachine;
    use crate::common::messages::ServerUpdate;
    use uuid::Uuid;

    fn ready_machine() -> SessionStateMachine {
        let mut machine = SessionStateMachine::new(Uuid::nil());
        machine.begin();
        machine.camera_acquired();
        machine.camera_frame_seen();
        machine.connection_opened();
        machine
    }

    fn apply(machine: &mut SessionStateMachine, json: &str) -> SessionView {
        machine.apply_update(&ServerUpdate::from_text(json).unwrap());
        SessionView::from_state(machine.state())
    }

    #[test]
    fn test_step_labels_and_colors() {
        let mut machine = ready_machine();

        let view = apply(&mut machine, r#"{"state":0}"#);
        assert_eq!(view.step_label, "Step 1 of 5");
        assert_eq!(view.progress_label, "0% Complete");
        assert_eq!(view.ring_color, "#667eea");

        let view = apply(&mut machine, r#"{"state":2,"yaw":-12.4}"#);
        assert_eq!(view.step_label, "Step 3 of 5");
        assert_eq!(view.progress_label, "40% Complete");
        assert_eq!(view.instruction.text, "Turn Head Left");
        assert_eq!(view.yaw_label, "-12°");

        let view = apply(&mut machine, r#"{"state":5,"total_time":12.3}"#);
        assert_eq!(view.step_label, "Complete!");
        assert_eq!(view.progress_label, "100% Complete");
        assert_eq!(view.ring_color, COMPLETE_COLOR);
        assert_eq!(view.elapsed_label, "12.3s");
        assert_eq!(view.completion_label, "Completed in 12.3s");
        assert!(view.show_completion_overlay);
    }

    #[test]
    fn test_status_labels() {
        let mut machine = SessionStateMachine::new(Uuid::nil());
        machine.begin();
        let view = SessionView::from_state(machine.state());
        assert_eq!(view.status_label, "Initializing camera...");
        assert!(!view.is_connected);

        machine.camera_frame_seen();
        let view = SessionView::from_state(machine.state());
        assert_eq!(view.status_label, "Reconnecting to server...");

        machine.connection_opened();
        let view = SessionView::from_state(machine.state());
        assert_eq!(view.status_label, "Connected");
        assert!(view.is_connected);
    }

    #[test]
    fn test_no_face_warning_hidden_when_complete() {
        let mut machine = ready_machine();
        let view = apply(&mut machine, r#"{"state":1,"face_detected":false}"#);
        assert!(view.show_no_face_warning);
        assert!(view.status_line().contains("No Face Detected"));

        let view = apply(&mut machine, r#"{"state":5,"face_detected":false}"#);
        assert!(!view.show_no_face_warning);
    }

    #[test]
    fn test_camera_error_outranks_transport_error() {
        let mut machine = SessionStateMachine::new(Uuid::nil());
        machine.connection_lost(true);
        machine.camera_failed(&crate::capture::CaptureError::PermissionDenied);

        let view = SessionView::from_state(machine.state());
        assert_eq!(
            view.error.as_deref(),
            Some("Camera access denied. Please allow camera permissions.")
        );
    }
}
