//! Trust scoring: bounded per-agent reputation.
//!
//! Every agent identity owns one [`TrustRecord`]. Scores move toward the
//! observed outcome with an exponential moving average and are clamped to
//! `[floor, ceiling]` so no sequence of outcomes can produce absolute trust
//! or absolute distrust.
//!
//! # Modules
//!
//! - [`estimator`]: EMA step, learning-rate policy, record type
//! - [`store`]: `TrustStore` trait with in-memory and JSON-file backends

pub mod estimator;
pub mod store;

pub use estimator::{LearningRate, TrustConfig, TrustRecord, TrustStats};
pub use store::{InMemoryTrustStore, JsonTrustStore, TrustError, TrustResult, TrustStore};

/// Score assigned to an agent that has never been updated.
pub const DEFAULT_SCORE: f64 = 0.85;
/// Lowest score any agent can reach.
pub const FLOOR: f64 = 0.3;
/// Highest score any agent can reach.
pub const CEILING: f64 = 1.0;
/// Agent identities seeded on first initialization of a store.
pub const SEEDED_AGENTS: &[&str] = &["architect", "pragmatist", "critic"];
