//! EMA estimator and trust record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CEILING, DEFAULT_SCORE, FLOOR};

/// How far a single observation moves the score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "alpha")]
pub enum LearningRate {
    /// Constant step size. Never fully converges.
    Fixed(f64),
    /// `1 / (1 + total_count)`, counted after the current observation.
    /// Early observations dominate and the score stabilizes over time.
    Decaying,
}

impl LearningRate {
    /// Step size for an agent that has now been observed `total` times.
    pub fn alpha(self, total: u64) -> f64 {
        match self {
            Self::Fixed(alpha) => alpha,
            Self::Decaying => 1.0 / (1.0 + total as f64),
        }
    }
}

impl std::fmt::Display for LearningRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixed(alpha) => write!(f, "fixed({alpha})"),
            Self::Decaying => write!(f, "decaying"),
        }
    }
}

/// Bounds and learning rate for a trust store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrustConfig {
    pub default_score: f64,
    pub floor: f64,
    pub ceiling: f64,
    pub learning_rate: LearningRate,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            default_score: DEFAULT_SCORE,
            floor: FLOOR,
            ceiling: CEILING,
            learning_rate: LearningRate::Decaying,
        }
    }
}

impl TrustConfig {
    /// Check that `floor <= default <= ceiling` and a fixed alpha lies in `(0, 1]`.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.floor <= self.default_score && self.default_score <= self.ceiling) {
            return Err(format!(
                "default score {} outside bounds [{}, {}]",
                self.default_score, self.floor, self.ceiling
            ));
        }
        if let LearningRate::Fixed(alpha) = self.learning_rate {
            if !(alpha > 0.0 && alpha <= 1.0) {
                return Err(format!("fixed learning rate {alpha} must be in (0, 1]"));
            }
        }
        Ok(())
    }

    /// One EMA step: `clamp(old + alpha * (outcome - old))`.
    pub fn step(&self, old: f64, was_correct: bool, total_after: u64) -> f64 {
        let outcome = if was_correct { 1.0 } else { 0.0 };
        let alpha = self.learning_rate.alpha(total_after);
        (old + alpha * (outcome - old)).clamp(self.floor, self.ceiling)
    }
}

/// Persisted reputation for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustRecord {
    pub agent_id: String,
    pub score: f64,
    pub correct_count: u64,
    pub total_count: u64,
    pub last_updated: DateTime<Utc>,
}

impl TrustRecord {
    /// Fresh record at the configured default score.
    pub fn seeded(agent_id: &str, config: &TrustConfig) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            score: config.default_score,
            correct_count: 0,
            total_count: 0,
            last_updated: Utc::now(),
        }
    }

    /// Record one observation and return the new score.
    pub fn observe(&mut self, was_correct: bool, config: &TrustConfig) -> f64 {
        if was_correct {
            self.correct_count += 1;
        }
        self.total_count += 1;
        self.score = config.step(self.score, was_correct, self.total_count);
        self.last_updated = Utc::now();
        self.score
    }

    pub fn stats(&self) -> TrustStats {
        TrustStats {
            agent_id: self.agent_id.clone(),
            score: self.score,
            correct_count: self.correct_count,
            total_count: self.total_count,
            accuracy: if self.total_count > 0 {
                self.correct_count as f64 / self.total_count as f64 * 100.0
            } else {
                0.0
            },
        }
    }
}

/// Read-only view of a record with derived accuracy (percent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustStats {
    pub agent_id: String,
    pub score: f64,
    pub correct_count: u64,
    pub total_count: u64,
    pub accuracy: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decaying_alpha_uses_post_increment_count() {
        assert!((LearningRate::Decaying.alpha(1) - 0.5).abs() < 1e-12);
        assert!((LearningRate::Decaying.alpha(3) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_first_decaying_update_moves_halfway() {
        let config = TrustConfig::default();
        let mut record = TrustRecord::seeded("architect", &config);
        let score = record.observe(true, &config);
        assert!((score - 0.925).abs() < 1e-12);
        assert_eq!(record.correct_count, 1);
        assert_eq!(record.total_count, 1);
    }

    #[test]
    fn test_fixed_rate_step() {
        let config = TrustConfig {
            learning_rate: LearningRate::Fixed(0.1),
            ..TrustConfig::default()
        };
        let mut record = TrustRecord::seeded("critic", &config);
        let score = record.observe(false, &config);
        assert!((score - 0.765).abs() < 1e-12);
    }

    #[test]
    fn test_step_clamps_to_floor() {
        let config = TrustConfig::default();
        // alpha = 1/2 from 0.35 toward 0 lands at 0.175, below the floor
        assert_eq!(config.step(0.35, false, 1), FLOOR);
    }

    #[test]
    fn test_stats_accuracy() {
        let config = TrustConfig::default();
        let mut record = TrustRecord::seeded("pragmatist", &config);
        assert_eq!(record.stats().accuracy, 0.0);
        record.observe(true, &config);
        record.observe(false, &config);
        record.observe(true, &config);
        record.observe(true, &config);
        assert!((record.stats().accuracy - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_validate_rejects_bad_config() {
        let bad_default = TrustConfig {
            default_score: 0.1,
            ..TrustConfig::default()
        };
        assert!(bad_default.validate().is_err());

        let bad_alpha = TrustConfig {
            learning_rate: LearningRate::Fixed(0.0),
            ..TrustConfig::default()
        };
        assert!(bad_alpha.validate().is_err());
        assert!(TrustConfig::default().validate().is_ok());
    }
}
