//! The fixed sequence of liveness challenges, shared by every session.

/// Number of steps in a verification attempt. A reported step at or above
/// this value means the attempt is complete.
pub const STEP_COUNT: usize = 5;

/// Theme color used once verification is complete.
pub const COMPLETE_COLOR: &str = "#22c55e";

/// One liveness challenge as presented to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// 1-based step number
    pub step: u32,
    pub text: &'static str,
    pub hint: &'static str,
    /// CSS hex color
    pub color: &'static str,
}

pub static INSTRUCTIONS: [Instruction; STEP_COUNT] = [
    Instruction {
        step: 1,
        text: "Blink Your Eyes",
        hint: "Close and open both eyes",
        color: "#667eea",
    },
    Instruction {
        step: 2,
        text: "Blink Again",
        hint: "One more time, close and open both eyes",
        color: "#667eea",
    },
    Instruction {
        step: 3,
        text: "Turn Head Left",
        hint: "Turn your head to the left side",
        color: "#f59e0b",
    },
    Instruction {
        step: 4,
        text: "Turn Head Right",
        hint: "Turn your head to the right side",
        color: "#3b82f6",
    },
    Instruction {
        step: 5,
        text: "Open Your Mouth",
        hint: "Open your mouth wide, then close it",
        color: "#22c55e",
    },
];

/// Instruction for a step index, falling back to the first one when out of range.
pub fn instruction_for(index: usize) -> &'static Instruction {
    INSTRUCTIONS.get(index).unwrap_or(&INSTRUCTIONS[0])
}
