//! Retry feedback: turns a failed attempt into the hint for the next one.
//!
//! The compiled string is passed verbatim into the next fix-generation
//! prompt, so it carries concrete error text rather than a summary.

use serde::{Deserialize, Serialize};

use crate::verifier::{TestFailure, TestResult};

/// Failing tests listed in feedback unless configured otherwise.
pub const DEFAULT_MAX_FAILURES: usize = 5;

/// Where in the attempt a failure happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "stage", content = "detail")]
pub enum AttemptFailure {
    /// LLM call or response contract failed.
    Generation(String),
    /// The mutator rejected an edit.
    Apply(String),
    /// Import/parse check failed.
    Syntax(String),
    /// Tests ran and failed.
    Tests(Vec<TestFailure>),
    /// The validator could not run a command at all.
    Validation(String),
}

impl AttemptFailure {
    /// Classify a failed [`TestResult`].
    pub fn from_result(result: &TestResult) -> Self {
        match &result.syntax_error {
            Some(err) => Self::Syntax(err.clone()),
            None => Self::Tests(result.failures.clone()),
        }
    }

    pub fn stage(&self) -> &'static str {
        match self {
            Self::Generation(_) => "generate",
            Self::Apply(_) => "apply",
            Self::Syntax(_) => "syntax_check",
            Self::Tests(_) => "test",
            Self::Validation(_) => "validate",
        }
    }
}

impl std::fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.stage())
    }
}

/// Builds feedback strings with a cap on listed test failures.
#[derive(Debug, Clone, Copy)]
pub struct FeedbackCompiler {
    max_failures: usize,
}

impl Default for FeedbackCompiler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FAILURES)
    }
}

impl FeedbackCompiler {
    pub fn new(max_failures: usize) -> Self {
        Self {
            max_failures: max_failures.max(1),
        }
    }

    pub fn compile(&self, failure: &AttemptFailure) -> String {
        match failure {
            AttemptFailure::Generation(err) => format!("Fix generation failed: {err}"),
            AttemptFailure::Apply(err) => format!("Apply failed: {err}"),
            AttemptFailure::Syntax(err) => format!("Syntax check failed:\n{err}"),
            AttemptFailure::Validation(err) => format!("Validation could not run: {err}"),
            AttemptFailure::Tests(failures) => {
                let mut lines = vec!["Tests failed:".to_string()];
                for f in failures.iter().take(self.max_failures) {
                    lines.push(format!("- {}: {}", f.test_name, f.message));
                }
                if failures.len() > self.max_failures {
                    lines.push(format!(
                        "- ... and {} more",
                        failures.len() - self.max_failures
                    ));
                }
                lines.join("\n")
            }
        }
    }
}
