//! Reflection store: append-only log of why past fixes failed.
//!
//! Entries are never edited or removed. The whole log is one JSON array,
//! rewritten after every append. Queries return newest entries first.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::MemoryError;

/// Matches rendered into a prompt by [`ReflectionMemory::format_for_prompt`].
pub const PROMPT_REFLECTION_LIMIT: usize = 3;
/// Title words shorter than this are ignored when matching a prompt.
const MIN_KEYWORD_LEN: usize = 4;

/// Explanation of one failed fix attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reflection {
    pub issue_number: u64,
    pub issue_title: String,
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub failure_modes: Vec<String>,
    pub reflection: String,
    #[serde(default)]
    pub edge_case_missed: Option<String>,
    #[serde(default)]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl Reflection {
    pub fn new(issue_number: u64, issue_title: &str, reflection: &str) -> Self {
        Self {
            issue_number,
            issue_title: issue_title.to_string(),
            template_id: None,
            failure_modes: Vec::new(),
            reflection: reflection.to_string(),
            edge_case_missed: None,
            recorded_at: Some(Utc::now()),
        }
    }

    pub fn with_template(mut self, template_id: &str) -> Self {
        self.template_id = Some(template_id.to_string());
        self
    }

    pub fn with_failure_modes(mut self, modes: Vec<String>) -> Self {
        self.failure_modes = modes;
        self
    }

    pub fn with_edge_case_missed(mut self, edge_case: &str) -> Self {
        self.edge_case_missed = Some(edge_case.to_string());
        self
    }

    fn matches(&self, needle_lower: &str) -> bool {
        self.issue_title.to_lowercase().contains(needle_lower)
            || self.reflection.to_lowercase().contains(needle_lower)
    }
}

/// Append-only reflection log, optionally backed by a JSON file.
#[derive(Debug, Default)]
pub struct ReflectionMemory {
    path: Option<PathBuf>,
    entries: Vec<Reflection>,
}

impl ReflectionMemory {
    /// Load from `path`. A missing file is an empty history.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, MemoryError> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => Vec::new(),
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| MemoryError::Corrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(source) => return Err(MemoryError::Io { path, source }),
        };

        tracing::debug!(path = %path.display(), entries = entries.len(), "Reflection memory loaded");
        Ok(Self {
            path: Some(path),
            entries,
        })
    }

    /// Memory with no backing file.
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append and persist.
    pub fn save(&mut self, reflection: Reflection) -> Result<(), MemoryError> {
        let mut reflection = reflection;
        if reflection.recorded_at.is_none() {
            reflection.recorded_at = Some(Utc::now());
        }
        self.entries.push(reflection);

        if let Err(e) = self.persist() {
            // Appends are all-or-nothing with respect to the file.
            self.entries.pop();
            return Err(e);
        }

        tracing::info!(entries = self.entries.len(), "Reflection saved");
        Ok(())
    }

    /// Entries whose title or text contains `keyword` (case-insensitive),
    /// newest first, at most `limit`.
    pub fn query(&self, keyword: &str, limit: usize) -> Vec<&Reflection> {
        let needle = keyword.to_lowercase();
        self.entries
            .iter()
            .rev()
            .filter(|r| r.matches(&needle))
            .take(limit)
            .collect()
    }

    /// Prompt block of past reflections relevant to `title`, or `""`.
    ///
    /// An entry matches on the whole title or on any title word of four or
    /// more characters.
    pub fn format_for_prompt(&self, title: &str) -> String {
        let mut needles: Vec<String> = vec![title.trim().to_lowercase()];
        for word in title.split(|c: char| !c.is_alphanumeric() && c != '_') {
            if word.chars().count() >= MIN_KEYWORD_LEN {
                let word = word.to_lowercase();
                if !needles.contains(&word) {
                    needles.push(word);
                }
            }
        }
        needles.retain(|n| !n.is_empty());

        let matches: Vec<&Reflection> = self
            .entries
            .iter()
            .rev()
            .filter(|r| needles.iter().any(|n| r.matches(n)))
            .take(PROMPT_REFLECTION_LIMIT)
            .collect();

        if matches.is_empty() {
            return String::new();
        }

        let mut lines = vec!["PAST REFLECTIONS (learn from these):".to_string()];
        for r in matches {
            let template = r.template_id.as_deref().unwrap_or("unknown");
            lines.push(format!(
                "- Issue #{} ({}): {}",
                r.issue_number, template, r.reflection
            ));
            if let Some(edge) = r.edge_case_missed.as_deref().filter(|e| !e.is_empty()) {
                lines.push(format!("  Edge case missed: {edge}"));
            }
        }
        lines.join("\n")
    }

    /// All entries, oldest first.
    pub fn all(&self) -> &[Reflection] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn persist(&self) -> Result<(), MemoryError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let io_err = |source: std::io::Error| MemoryError::Io {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(path, json).map_err(io_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample(n: u64, title: &str, text: &str) -> Reflection {
        Reflection::new(n, title, text).with_template("wrong_value")
    }

    #[test]
    fn test_missing_file_is_empty_history() {
        let dir = TempDir::new().unwrap();
        let memory = ReflectionMemory::open(dir.path().join("nope.json")).unwrap();
        assert!(memory.is_empty());
    }

    #[test]
    fn test_save_persists_and_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("reflections.json");
        let mut memory = ReflectionMemory::open(&path).unwrap();
        memory
            .save(sample(1, "Default trust wrong", "Edited the wrong constant"))
            .unwrap();

        let reloaded = ReflectionMemory::open(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.all()[0].issue_number, 1);
        assert!(reloaded.all()[0].recorded_at.is_some());
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("r.json");
        std::fs::write(&path, "[{").unwrap();
        assert!(matches!(
            ReflectionMemory::open(&path),
            Err(MemoryError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_query_newest_first_and_limited() {
        let mut memory = ReflectionMemory::in_memory();
        memory.save(sample(1, "Trust floor", "first")).unwrap();
        memory.save(sample(2, "Unrelated", "nothing")).unwrap();
        memory.save(sample(3, "trust ceiling", "second")).unwrap();
        memory.save(sample(4, "Other", "TRUST mentioned")).unwrap();

        let hits = memory.query("Trust", 2);
        let numbers: Vec<u64> = hits.iter().map(|r| r.issue_number).collect();
        assert_eq!(numbers, vec![4, 3]);
        assert_eq!(memory.query("trust", 10).len(), 3);
        assert!(memory.query("absent", 10).is_empty());
    }

    #[test]
    fn test_format_for_prompt_empty_when_no_match() {
        let mut memory = ReflectionMemory::in_memory();
        memory.save(sample(1, "Typo in README", "fixed wrong file")).unwrap();
        assert_eq!(memory.format_for_prompt("Debate judge crash"), "");
    }

    #[test]
    fn test_format_for_prompt_block() {
        let mut memory = ReflectionMemory::in_memory();
        memory
            .save(
                sample(7, "Critic temperature wrong", "Changed architect instead of critic")
                    .with_edge_case_missed("temperature of unknown agent"),
            )
            .unwrap();
        memory.save(sample(8, "Unrelated", "nope")).unwrap();

        let block = memory.format_for_prompt("Critic uses wrong temperature");
        assert_eq!(
            block,
            "PAST REFLECTIONS (learn from these):\n\
             - Issue #7 (wrong_value): Changed architect instead of critic\n  \
             Edge case missed: temperature of unknown agent"
        );
    }

    #[test]
    fn test_format_for_prompt_caps_at_three() {
        let mut memory = ReflectionMemory::in_memory();
        for n in 1..=5 {
            memory.save(sample(n, "trust bug", "x")).unwrap();
        }
        let block = memory.format_for_prompt("trust bug");
        assert_eq!(block.lines().count(), 4);
        assert!(block.contains("Issue #5"));
        assert!(!block.contains("Issue #2"));
    }
}
