//! Glassbox coordination engine.
//!
//! The deterministic half of the bug-fixing agent: everything that does not
//! need a model or a network connection lives here, so it can be tested with
//! temp dirs and scripted backends.
//!
//! # Modules
//!
//! - [`trust`]: bounded EMA trust scores per agent, in memory or on disk
//! - [`debate`]: consensus fan-out and the three-round persuasion debate
//! - [`mutator`]: line-range edits with indentation carry-over and fuzzy lookup
//! - [`verifier`]: syntax gate, test gate, diff-size gate over a subprocess
//! - [`feedback`]: turns a failed attempt into the next prompt's feedback
//! - [`memory`]: append-only reflections from exhausted runs
//! - [`triage`]: the structured briefing produced by classification
//! - [`template`]: YAML bug-fix templates and keyword matching
//! - [`shell_safety`]: argument and branch-name checks for git/gh calls

#![allow(clippy::uninlined_format_args)]

pub mod debate;
pub mod feedback;
pub mod json_block;
pub mod memory;
pub mod mutator;
pub mod shell_safety;
pub mod template;
pub mod triage;
pub mod trust;
pub mod verifier;

pub use debate::{
    AgentBackend, BackendError, ConsensusReport, DebateError, DebateOrchestrator, DebateReport,
    Persona, Roster,
};
pub use feedback::{AttemptFailure, FeedbackCompiler};
pub use json_block::extract_json_block;
pub use memory::{MemoryError, Reflection, ReflectionMemory};
pub use mutator::{AppliedEdit, CodeMutator, Fix, LineEdit, MutationError};
pub use template::{Template, TemplateError, TemplateLoader};
pub use triage::{EdgeCase, EdgeTier, TriageError, TriageResult};
pub use trust::{InMemoryTrustStore, JsonTrustStore, TrustConfig, TrustError, TrustStore};
pub use verifier::{TestFailure, TestResult, Validator, ValidatorConfig, ValidatorError};
