//! Pipeline state machine with explicit states and legal transition guards.
//!
//! Every transition is logged and recorded, so a finished run can be
//! inspected (and replayed in tests) through [`StateMachine::transitions`].
//! The pipeline calls `advance()` to move between states; illegal edges are
//! rejected with [`IllegalTransition`].

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// The set of pipeline states.
///
/// Every run starts at `Classify` and terminates at `Skip`, `Done` or
/// `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Asking the classifier for a triage result.
    Classify,
    /// Classifier said this is not a fixable bug. Terminal.
    Skip,
    /// Asking the fix generator for a line-edit set.
    Generate,
    /// Writing the edits and the generated test to disk.
    Apply,
    /// Import/syntax gate over the touched modules.
    SyntaxCheck,
    /// Full test suite.
    Test,
    /// Tests green, PR opened. Terminal.
    Done,
    /// Classification failed or the retry budget is spent. Terminal.
    Failed,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Skip | Self::Done | Self::Failed)
    }

    /// States whose failure sends the run back to `Generate`.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Generate | Self::Apply | Self::SyntaxCheck | Self::Test
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Classify => "CLASSIFY",
            Self::Skip => "SKIP",
            Self::Generate => "GENERATE",
            Self::Apply => "APPLY",
            Self::SyntaxCheck => "SYNTAX_CHECK",
            Self::Test => "TEST",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Legal transitions between pipeline states.
///
/// ```text
/// Classify    → Skip | Generate
/// Generate    → Apply | Generate
/// Apply       → SyntaxCheck | Generate
/// SyntaxCheck → Test | Generate
/// Test        → Done | Generate
/// any non-terminal → Failed
/// ```
fn is_legal_transition(from: PipelineState, to: PipelineState) -> bool {
    use PipelineState::*;

    if to == Failed && !from.is_terminal() {
        return true;
    }
    // Retry edge: any attempt stage can fall back to a fresh GENERATE.
    if to == Generate && from.is_retryable() {
        return true;
    }

    matches!(
        (from, to),
        (Classify, Skip)
            | (Classify, Generate)
            | (Generate, Apply)
            | (Apply, SyntaxCheck)
            | (SyntaxCheck, Test)
            | (Test, Done)
    )
}

/// A single recorded state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: PipelineState,
    pub to: PipelineState,
    /// Attempt number at the time of transition (0 before the first GENERATE).
    pub attempt: u32,
    /// Milliseconds since the state machine was created.
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Error returned when an illegal transition is attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IllegalTransition {
    pub from: PipelineState,
    pub to: PipelineState,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Illegal state transition: {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for IllegalTransition {}

/// Tracks the current state, enforces legal transitions, and keeps the
/// full transition log.
#[derive(Debug)]
pub struct StateMachine {
    current: PipelineState,
    attempt: u32,
    created_at: Instant,
    transitions: Vec<TransitionRecord>,
}

impl StateMachine {
    /// A new machine at `Classify`.
    pub fn new() -> Self {
        Self {
            current: PipelineState::Classify,
            attempt: 0,
            created_at: Instant::now(),
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> PipelineState {
        self.current
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn set_attempt(&mut self, attempt: u32) {
        self.attempt = attempt;
    }

    pub fn advance(
        &mut self,
        to: PipelineState,
        reason: Option<&str>,
    ) -> Result<(), IllegalTransition> {
        if !is_legal_transition(self.current, to) {
            return Err(IllegalTransition {
                from: self.current,
                to,
            });
        }

        let record = TransitionRecord {
            from: self.current,
            to,
            attempt: self.attempt,
            elapsed_ms: self.created_at.elapsed().as_millis() as u64,
            reason: reason.map(String::from),
        };

        tracing::info!(
            from = %self.current,
            to = %to,
            attempt = self.attempt,
            reason = reason.unwrap_or(""),
            "State transition"
        );

        self.transitions.push(record);
        self.current = to;
        Ok(())
    }

    /// Transition to `Failed`. Always legal from non-terminal states.
    pub fn fail(&mut self, reason: &str) -> Result<(), IllegalTransition> {
        self.advance(PipelineState::Failed, Some(reason))
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// Consume the machine, keeping only its log.
    pub fn into_transitions(self) -> Vec<TransitionRecord> {
        self.transitions
    }

    /// `CLASSIFY -> DONE (12ms, 6 transitions) [GENERATE -> ... -> DONE]`
    pub fn summary(&self) -> String {
        let mut out = format!(
            "{} -> {} ({}ms, {} transitions)",
            PipelineState::Classify,
            self.current,
            self.created_at.elapsed().as_millis(),
            self.transitions.len(),
        );
        if !self.transitions.is_empty() {
            let states: Vec<String> = self.transitions.iter().map(|t| t.to.to_string()).collect();
            out.push_str(&format!(" [{}]", states.join(" -> ")));
        }
        out
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
