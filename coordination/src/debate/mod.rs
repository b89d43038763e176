//! Multi-agent consensus and debate over a shared trust store.
//!
//! # Modes
//!
//! ```text
//! consensus:  ask(all agents) concurrently ─→ highest trust wins
//!
//! debate:     round 1 ─→ round 2 ─→ round 3   (sequential, growing transcript)
//!                                      │
//!                                      ├─→ summary (first agent, optional)
//!                                      └─→ judge ─→ trust.update(persuader, true)
//! ```
//!
//! # Modules
//!
//! - [`personas`]: roster of LLM-backed agents
//! - [`state`]: rounds, turns and the transcript
//! - [`consensus`]: single-shot answer selection
//! - [`judge`]: lenient parse of persuasion verdicts
//! - [`orchestrator`]: drives both modes through an [`AgentBackend`]

pub mod consensus;
pub mod judge;
pub mod orchestrator;
pub mod personas;
pub mod state;

pub use consensus::{pick_consensus, AgentFailure, AgentResponse, ConsensusReport};
pub use judge::{JudgeOutcome, Verdict};
pub use orchestrator::{
    AgentBackend, BackendError, DebateConfig, DebateError, DebateOrchestrator, DebateOutcome,
    DebateReport, TrustChange,
};
pub use personas::{Persona, Roster};
pub use state::{DebateTurn, Round, Transcript};
