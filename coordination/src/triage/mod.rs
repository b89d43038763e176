//! Triage: the classifier's structured briefing for one issue.
//!
//! A [`TriageResult`] is produced once per issue and is immutable afterwards.
//! Required structure is enforced by serde at the parse boundary and by
//! [`TriageResult::validate`] for value ranges.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Edge-case coverage tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EdgeTier {
    /// Happy path.
    T1,
    /// Input variation.
    T2,
    /// Error path.
    T3,
    /// Boundary.
    T4,
}

impl EdgeTier {
    pub const ALL: [EdgeTier; 4] = [Self::T1, Self::T2, Self::T3, Self::T4];

    pub fn describe(self) -> &'static str {
        match self {
            Self::T1 => "happy path",
            Self::T2 => "input variation",
            Self::T3 => "error path",
            Self::T4 => "boundary",
        }
    }

    /// Tiers with no case in `cases`, in tier order.
    pub fn missing(cases: &[EdgeCase]) -> Vec<EdgeTier> {
        Self::ALL
            .into_iter()
            .filter(|tier| !cases.iter().any(|c| c.tier == *tier))
            .collect()
    }
}

impl std::fmt::Display for EdgeTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::T1 => write!(f, "T1"),
            Self::T2 => write!(f, "T2"),
            Self::T3 => write!(f, "T3"),
            Self::T4 => write!(f, "T4"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeCase {
    pub tier: EdgeTier,
    pub scenario: String,
    pub expected: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftAspect {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftChallenge {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub risk: String,
}

/// Classifier output for one issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageResult {
    pub template_id: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: String,
    pub confidence: f64,
    /// Non-error reason not to attempt a fix (`feature_request`, `duplicate`, ...).
    #[serde(default)]
    pub skip_reason: Option<String>,
    #[serde(default)]
    pub soft_aspects: Vec<SoftAspect>,
    #[serde(default)]
    pub soft_challenges: Vec<SoftChallenge>,
    #[serde(default)]
    pub edge_cases: Vec<EdgeCase>,
}

fn default_difficulty() -> String {
    "easy".to_string()
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TriageError {
    #[error("confidence {0} outside [0, 1]")]
    ConfidenceOutOfRange(f64),

    #[error("template_id is empty")]
    EmptyTemplateId,
}

impl TriageResult {
    /// Range checks serde cannot express.
    pub fn validate(&self) -> Result<(), TriageError> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(TriageError::ConfidenceOutOfRange(self.confidence));
        }
        if self.template_id.trim().is_empty() {
            return Err(TriageError::EmptyTemplateId);
        }
        Ok(())
    }

    /// A skip reason that is present and non-blank.
    pub fn skip(&self) -> Option<&str> {
        self.skip_reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }
}
