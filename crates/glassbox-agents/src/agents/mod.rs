//! The three pipeline roles.
//!
//! | Role       | Type             | Talks to the LLM | Output                 |
//! |------------|------------------|------------------|------------------------|
//! | Manager    | [`Classifier`]   | yes (JSON mode)  | `TriageResult`         |
//! | Junior Dev | [`FixGenerator`] | yes (JSON mode)  | `Fix`                  |
//! | Tester     | [`tester`]       | no               | markdown report        |

pub mod junior_dev;
pub mod manager;
pub mod tester;

pub use junior_dev::{format_fix_comment, FixGenerator};
pub use manager::{format_briefing, Classifier};
pub use tester::format_report;

use thiserror::Error;

use crate::contracts::ContractError;
use crate::llm::LlmError;

/// Why an agent produced no usable result.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Contract(#[from] ContractError),
}

