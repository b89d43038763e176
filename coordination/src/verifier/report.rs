//! Validation report: structured output of one validator run.

use serde::{Deserialize, Serialize};

/// Outcome of a single validation gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateOutcome {
    /// Gate passed successfully
    Passed,
    /// Gate failed
    Failed,
    /// Gate was not run because an earlier gate failed
    Skipped,
    /// Gate exceeded a soft budget but does not block
    Warning,
}

impl GateOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed | Self::Warning)
    }
}

impl std::fmt::Display for GateOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Passed => write!(f, "PASS"),
            Self::Failed => write!(f, "FAIL"),
            Self::Skipped => write!(f, "SKIP"),
            Self::Warning => write!(f, "WARN"),
        }
    }
}

/// Which gate produced a [`GateResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    /// Import/parse check over the edited modules.
    Syntax,
    /// Full test command.
    Tests,
    /// Edited-line budget.
    DiffSize,
}

impl std::fmt::Display for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Syntax => write!(f, "syntax"),
            Self::Tests => write!(f, "tests"),
            Self::DiffSize => write!(f, "diff_size"),
        }
    }
}

/// Result of a single validation gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateResult {
    pub gate: Gate,
    pub outcome: GateOutcome,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

/// One failing test (or synthetic failure).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestFailure {
    pub test_name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl TestFailure {
    pub fn new(test_name: &str, message: &str) -> Self {
        Self {
            test_name: test_name.to_string(),
            message: message.to_string(),
            file: None,
            line: None,
        }
    }
}

/// Outcome of validating one fix.
///
/// `passed == false` always comes with at least one failure entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub passed: bool,
    /// Tests counted from the runner's summary. Zero when tests never ran.
    pub total: usize,
    pub failures: Vec<TestFailure>,
    /// Combined runner output (or the syntax diagnostic).
    pub output: String,
    /// Sum of replaced line spans across the fix.
    pub diff_lines: usize,
    /// Set when the syntax gate failed and tests were not run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syntax_error: Option<String>,
    #[serde(default)]
    pub gates: Vec<GateResult>,
}

impl TestResult {
    /// Failed result carrying a single failure.
    pub fn failed(test_name: &str, message: &str, output: String) -> Self {
        Self {
            passed: false,
            total: 0,
            failures: vec![TestFailure::new(test_name, message)],
            output,
            diff_lines: 0,
            syntax_error: None,
            gates: Vec::new(),
        }
    }

    /// Whether the fix stayed within `max` edited lines.
    pub fn diff_within_budget(&self, max: usize) -> bool {
        self.diff_lines <= max
    }

    /// Whether the test gate actually ran.
    pub fn tests_ran(&self) -> bool {
        self.gates
            .iter()
            .any(|g| g.gate == Gate::Tests && g.outcome != GateOutcome::Skipped)
    }

    pub fn gate(&self, gate: Gate) -> Option<&GateResult> {
        self.gates.iter().find(|g| g.gate == gate)
    }
}
