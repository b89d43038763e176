//! Debate transcript and round structure.

use serde::{Deserialize, Serialize};

/// Placeholder history for the opening turn.
pub const EMPTY_HISTORY: &str = "(no prior messages)";

/// The three fixed debate rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Round {
    Opening,
    Rebuttal,
    Convergence,
}

impl Round {
    pub const ALL: [Round; 3] = [Round::Opening, Round::Rebuttal, Round::Convergence];

    /// Zero-based index of the round.
    pub fn index(self) -> usize {
        match self {
            Self::Opening => 0,
            Self::Rebuttal => 1,
            Self::Convergence => 2,
        }
    }

    pub fn instruction(self) -> &'static str {
        match self {
            Self::Opening => {
                "Round 1: State your position on the task. Be specific about the approach you would take."
            }
            Self::Rebuttal => {
                "Round 2: Respond to the other agents by name. Challenge anything you disagree with."
            }
            Self::Convergence => {
                "Round 3: Final position. Start with CHANGED: <who persuaded you and why> or HOLDING: <why you kept your view>."
            }
        }
    }
}

impl std::fmt::Display for Round {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Opening => write!(f, "opening"),
            Self::Rebuttal => write!(f, "rebuttal"),
            Self::Convergence => write!(f, "convergence"),
        }
    }
}

/// One agent utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateTurn {
    pub agent_id: String,
    pub round_index: usize,
    pub text: String,
}

/// Ordered list of debate turns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<DebateTurn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, agent_id: &str, round: Round, text: impl Into<String>) {
        self.turns.push(DebateTurn {
            agent_id: agent_id.to_string(),
            round_index: round.index(),
            text: text.into(),
        });
    }

    pub fn turns(&self) -> &[DebateTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn round(&self, round: Round) -> impl Iterator<Item = &DebateTurn> {
        self.turns
            .iter()
            .filter(move |t| t.round_index == round.index())
    }

    /// `@agent: text` lines, or the empty-history placeholder.
    pub fn history(&self) -> String {
        if self.turns.is_empty() {
            return EMPTY_HISTORY.to_string();
        }
        self.turns
            .iter()
            .map(|t| format!("@{}: {}", t.agent_id, t.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// User message for a single debate turn.
pub fn turn_message(task: &str, history: &str, round: Round, agent_id: &str) -> String {
    format!(
        "TASK: {task}\n\nConversation so far:\n{history}\n\n{}\n\nRespond as @{agent_id}:",
        round.instruction()
    )
}
