//! Trust stores: the single writer of agent scores.
//!
//! Consumers hold an `Arc<dyn TrustStore>`; there is no ambient instance.
//! [`JsonTrustStore`] persists synchronously inside `update`, so a score
//! returned to the caller is already durable.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use super::estimator::{TrustConfig, TrustRecord, TrustStats};
use super::SEEDED_AGENTS;

/// Error type for trust store operations
#[derive(Debug, thiserror::Error)]
pub enum TrustError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt trust store {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid trust config: {0}")]
    InvalidConfig(String),

    #[error("Lock poisoned")]
    LockPoisoned,
}

/// Result type for trust store operations
pub type TrustResult<T> = Result<T, TrustError>;

/// Per-agent reputation store.
pub trait TrustStore: Send + Sync {
    /// Current score, or the configured default for an unknown agent.
    fn get(&self, agent: &str) -> f64;

    /// Record one outcome and return the new (already persisted) score.
    fn update(&self, agent: &str, was_correct: bool) -> TrustResult<f64>;

    /// All scores, highest first. Ties are ordered by agent id.
    fn all(&self) -> Vec<(String, f64)>;

    /// Counters and accuracy for a known agent.
    fn stats(&self, agent: &str) -> Option<TrustStats>;

    /// Restore one agent (or every agent) to the default score with zero counters.
    fn reset(&self, agent: Option<&str>) -> TrustResult<()>;

    /// Full records in agent-id order.
    fn records(&self) -> Vec<TrustRecord>;

    fn config(&self) -> TrustConfig;
}

/// Record table shared by both backends.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Ledger {
    agents: BTreeMap<String, TrustRecord>,
}

impl Ledger {
    fn seeded(config: &TrustConfig) -> Self {
        let mut ledger = Self::default();
        ledger.seed(config);
        ledger
    }

    /// Insert any seeded agent that is missing. Returns true if something was added.
    fn seed(&mut self, config: &TrustConfig) -> bool {
        let mut added = false;
        for agent in SEEDED_AGENTS {
            if !self.agents.contains_key(*agent) {
                self.agents
                    .insert(agent.to_string(), TrustRecord::seeded(agent, config));
                added = true;
            }
        }
        added
    }

    fn score(&self, agent: &str, config: &TrustConfig) -> f64 {
        self.agents
            .get(agent)
            .map(|r| r.score)
            .unwrap_or(config.default_score)
    }

    fn observe(&mut self, agent: &str, was_correct: bool, config: &TrustConfig) -> f64 {
        self.agents
            .entry(agent.to_string())
            .or_insert_with(|| TrustRecord::seeded(agent, config))
            .observe(was_correct, config)
    }

    fn reset(&mut self, agent: Option<&str>, config: &TrustConfig) {
        match agent {
            Some(agent) => {
                self.agents
                    .insert(agent.to_string(), TrustRecord::seeded(agent, config));
            }
            None => {
                for (id, record) in self.agents.iter_mut() {
                    *record = TrustRecord::seeded(id, config);
                }
            }
        }
    }

    fn ranked(&self) -> Vec<(String, f64)> {
        let mut scores: Vec<(String, f64)> = self
            .agents
            .values()
            .map(|r| (r.agent_id.clone(), r.score))
            .collect();
        // BTreeMap order is by id, and the sort is stable, so ties stay id-ordered.
        scores.sort_by(|a, b| b.1.total_cmp(&a.1));
        scores
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

/// Non-persistent store for tests and one-off runs.
pub struct InMemoryTrustStore {
    config: TrustConfig,
    ledger: RwLock<Ledger>,
}

impl InMemoryTrustStore {
    /// Seeded store with the default bounds and learning rate.
    pub fn new() -> Self {
        let config = TrustConfig::default();
        Self {
            ledger: RwLock::new(Ledger::seeded(&config)),
            config,
        }
    }

    pub fn with_config(config: TrustConfig) -> TrustResult<Self> {
        config.validate().map_err(TrustError::InvalidConfig)?;
        Ok(Self {
            ledger: RwLock::new(Ledger::seeded(&config)),
            config,
        })
    }
}

impl Default for InMemoryTrustStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TrustStore for InMemoryTrustStore {
    fn get(&self, agent: &str) -> f64 {
        let ledger = self.ledger.read().unwrap_or_else(PoisonError::into_inner);
        ledger.score(agent, &self.config)
    }

    fn update(&self, agent: &str, was_correct: bool) -> TrustResult<f64> {
        let mut ledger = self.ledger.write().map_err(|_| TrustError::LockPoisoned)?;
        let score = ledger.observe(agent, was_correct, &self.config);
        tracing::debug!(agent, was_correct, score, "Trust updated");
        Ok(score)
    }

    fn all(&self) -> Vec<(String, f64)> {
        let ledger = self.ledger.read().unwrap_or_else(PoisonError::into_inner);
        ledger.ranked()
    }

    fn stats(&self, agent: &str) -> Option<TrustStats> {
        let ledger = self.ledger.read().unwrap_or_else(PoisonError::into_inner);
        ledger.agents.get(agent).map(TrustRecord::stats)
    }

    fn reset(&self, agent: Option<&str>) -> TrustResult<()> {
        let mut ledger = self.ledger.write().map_err(|_| TrustError::LockPoisoned)?;
        ledger.reset(agent, &self.config);
        Ok(())
    }

    fn records(&self) -> Vec<TrustRecord> {
        let ledger = self.ledger.read().unwrap_or_else(PoisonError::into_inner);
        ledger.agents.values().cloned().collect()
    }

    fn config(&self) -> TrustConfig {
        self.config
    }
}

// ============================================================================
// JSON-file backend
// ============================================================================

/// On-disk layout of the trust table.
#[derive(Debug, Serialize, Deserialize)]
struct TrustDocument {
    version: u32,
    #[serde(flatten)]
    ledger: Ledger,
}

impl TrustDocument {
    const CURRENT_VERSION: u32 = 1;
}

/// Store persisted as a single JSON document keyed by agent id.
///
/// Writes go to a sibling temp file and are renamed into place.
pub struct JsonTrustStore {
    config: TrustConfig,
    path: PathBuf,
    ledger: RwLock<Ledger>,
}

impl JsonTrustStore {
    /// Open with the default config, creating a seeded file if absent.
    pub fn open(path: impl Into<PathBuf>) -> TrustResult<Self> {
        Self::open_with_config(path, TrustConfig::default())
    }

    pub fn open_with_config(path: impl Into<PathBuf>, config: TrustConfig) -> TrustResult<Self> {
        config.validate().map_err(TrustError::InvalidConfig)?;
        let path = path.into();

        let (mut ledger, existed) = if path.exists() {
            (Self::load(&path)?, true)
        } else {
            (Ledger::default(), false)
        };
        let seeded = ledger.seed(&config);
        if seeded || !existed {
            write_ledger(&path, &ledger)?;
        }

        tracing::debug!(path = %path.display(), agents = ledger.agents.len(), "Trust store opened");

        Ok(Self {
            config,
            path,
            ledger: RwLock::new(ledger),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> TrustResult<Ledger> {
        let raw = std::fs::read_to_string(path).map_err(|source| TrustError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if raw.trim().is_empty() {
            return Ok(Ledger::default());
        }
        let doc: TrustDocument = serde_json::from_str(&raw).map_err(|e| TrustError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if doc.version > TrustDocument::CURRENT_VERSION {
            return Err(TrustError::Corrupt {
                path: path.to_path_buf(),
                reason: format!(
                    "unsupported version {} (max {})",
                    doc.version,
                    TrustDocument::CURRENT_VERSION
                ),
            });
        }
        Ok(doc.ledger)
    }
}

fn write_ledger(path: &Path, ledger: &Ledger) -> TrustResult<()> {
    let io_err = |source: std::io::Error| TrustError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let doc = TrustDocument {
        version: TrustDocument::CURRENT_VERSION,
        ledger: ledger.clone(),
    };
    let json =
        serde_json::to_string_pretty(&doc).map_err(|e| TrustError::Serialization(e.to_string()))?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)
}

impl TrustStore for JsonTrustStore {
    fn get(&self, agent: &str) -> f64 {
        let ledger = self.ledger.read().unwrap_or_else(PoisonError::into_inner);
        ledger.score(agent, &self.config)
    }

    fn update(&self, agent: &str, was_correct: bool) -> TrustResult<f64> {
        let mut ledger = self.ledger.write().map_err(|_| TrustError::LockPoisoned)?;
        let previous = ledger.agents.get(agent).cloned();
        let score = ledger.observe(agent, was_correct, &self.config);

        if let Err(e) = write_ledger(&self.path, &ledger) {
            // Keep memory consistent with what is on disk.
            match previous {
                Some(record) => ledger.agents.insert(agent.to_string(), record),
                None => ledger.agents.remove(agent),
            };
            return Err(e);
        }

        tracing::debug!(agent, was_correct, score, "Trust updated");
        Ok(score)
    }

    fn all(&self) -> Vec<(String, f64)> {
        let ledger = self.ledger.read().unwrap_or_else(PoisonError::into_inner);
        ledger.ranked()
    }

    fn stats(&self, agent: &str) -> Option<TrustStats> {
        let ledger = self.ledger.read().unwrap_or_else(PoisonError::into_inner);
        ledger.agents.get(agent).map(TrustRecord::stats)
    }

    fn reset(&self, agent: Option<&str>) -> TrustResult<()> {
        let mut ledger = self.ledger.write().map_err(|_| TrustError::LockPoisoned)?;
        ledger.reset(agent, &self.config);
        write_ledger(&self.path, &ledger)
    }

    fn records(&self) -> Vec<TrustRecord> {
        let ledger = self.ledger.read().unwrap_or_else(PoisonError::into_inner);
        ledger.agents.values().cloned().collect()
    }

    fn config(&self) -> TrustConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::{LearningRate, CEILING, DEFAULT_SCORE, FLOOR};
    use tempfile::TempDir;

    #[test]
    fn test_unknown_agent_gets_default() {
        let store = InMemoryTrustStore::new();
        assert_eq!(store.get("nobody"), DEFAULT_SCORE);
        assert!(store.stats("nobody").is_none());
    }

    #[test]
    fn test_seeded_agents_present() {
        let store = InMemoryTrustStore::new();
        let ids: Vec<String> = store.records().into_iter().map(|r| r.agent_id).collect();
        assert_eq!(ids, vec!["architect", "critic", "pragmatist"]);
    }

    #[test]
    fn test_update_creates_record_lazily() {
        let store = InMemoryTrustStore::new();
        let score = store.update("newcomer", true).unwrap();
        assert!(score > DEFAULT_SCORE);
        let stats = store.stats("newcomer").unwrap();
        assert_eq!(stats.total_count, 1);
        assert_eq!(stats.correct_count, 1);
    }

    #[test]
    fn test_all_sorted_desc_with_id_ties() {
        let store = InMemoryTrustStore::new();
        store.update("critic", true).unwrap();
        store.update("pragmatist", false).unwrap();
        let all = store.all();
        assert_eq!(all[0].0, "critic");
        assert_eq!(all[1].0, "architect");
        assert_eq!(all[2].0, "pragmatist");
    }

    #[test]
    fn test_reset_single_and_all() {
        let store = InMemoryTrustStore::new();
        store.update("critic", true).unwrap();
        store.update("architect", false).unwrap();

        store.reset(Some("critic")).unwrap();
        assert_eq!(store.get("critic"), DEFAULT_SCORE);
        assert!(store.get("architect") < DEFAULT_SCORE);

        store.reset(None).unwrap();
        assert_eq!(store.get("architect"), DEFAULT_SCORE);
        assert_eq!(store.stats("architect").unwrap().total_count, 0);
    }

    #[test]
    fn test_long_streaks_stay_in_bounds() {
        let store = InMemoryTrustStore::with_config(TrustConfig {
            learning_rate: LearningRate::Fixed(0.1),
            ..TrustConfig::default()
        })
        .unwrap();
        for _ in 0..500 {
            store.update("architect", true).unwrap();
        }
        assert!(store.get("architect") <= CEILING);
        for _ in 0..500 {
            store.update("architect", false).unwrap();
        }
        assert!(store.get("architect") >= FLOOR);
    }

    #[test]
    fn test_json_store_creates_seeded_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("trust.json");
        let store = JsonTrustStore::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(store.all().len(), 3);
    }

    #[test]
    fn test_json_store_persists_update_before_returning() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trust.json");
        let score = {
            let store = JsonTrustStore::open(&path).unwrap();
            store.update("critic", true).unwrap()
        };
        let reopened = JsonTrustStore::open(&path).unwrap();
        assert_eq!(reopened.get("critic"), score);
        assert_eq!(reopened.stats("critic").unwrap().total_count, 1);
    }

    #[test]
    fn test_json_store_rejects_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trust.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = JsonTrustStore::open(&path).err().unwrap();
        assert!(matches!(err, TrustError::Corrupt { .. }));
    }

    #[test]
    fn test_json_store_reseeds_missing_agents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trust.json");
        std::fs::write(&path, r#"{"version":1,"agents":{}}"#).unwrap();
        let store = JsonTrustStore::open(&path).unwrap();
        assert_eq!(store.records().len(), 3);
    }
}
