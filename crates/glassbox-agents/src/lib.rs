//! Agent runtime for glassbox.
//!
//! Wires the deterministic engine in `coordination` to an LLM endpoint and
//! an issue host.
//!
//! # Modules
//!
//! - [`config`]: layered settings (defaults, TOML, environment)
//! - [`llm`]: completion capability and the OpenAI-compatible client
//! - [`contracts`]: strict parsing of model replies
//! - [`prompts`]: classifier and fix prompts
//! - [`agents`]: Manager, Junior Dev and Tester roles
//! - [`tracker`]: issue host capability and the `gh` implementation
//! - [`workspace`]: working tree sources and reset-to-baseline
//! - [`state_machine`]: pipeline states and legal transitions
//! - [`pipeline`]: the retry pipeline
//! - [`debate_backend`]: debate agents backed by the LLM client

pub mod agents;
pub mod config;
pub mod contracts;
pub mod debate_backend;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod state_machine;
pub mod tracker;
pub mod workspace;

pub use config::Settings;
pub use pipeline::{PipelineError, RetryPipeline, RunOutcome, RunStatus};
