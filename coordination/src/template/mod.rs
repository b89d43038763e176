//! Fix templates: static descriptions of known bug-fix patterns.
//!
//! Templates are YAML documents (one per file) providing matching keywords,
//! a file/diff budget, coder instructions and a retry budget. Adding a
//! pattern means dropping a new `*.yaml` file in the templates directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// YAML shipped with the crate, used when no templates directory is configured.
const BUILTIN: &[(&str, &str)] = &[
    ("missing_guard.yaml", include_str!("../../templates/missing_guard.yaml")),
    ("off_by_one.yaml", include_str!("../../templates/off_by_one.yaml")),
    ("typo_fix.yaml", include_str!("../../templates/typo_fix.yaml")),
    ("wrong_value.yaml", include_str!("../../templates/wrong_value.yaml")),
];

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid template {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("No templates found in {0}")]
    Empty(String),
}

/// A loaded template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub difficulty: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub soft_aspects_menu: Vec<String>,
    pub max_files: usize,
    pub max_diff_lines: usize,
    pub coder_instructions: String,
    /// Retries after the first attempt. `None` defers to the caller's default.
    pub max_attempts: Option<u32>,
    pub on_fail: String,
}

/// On-disk shape.
#[derive(Debug, Deserialize)]
struct TemplateFile {
    id: String,
    name: String,
    #[serde(default = "default_difficulty")]
    difficulty: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    signals: Signals,
    #[serde(default)]
    soft_aspects_menu: Vec<String>,
    #[serde(default = "default_max_files")]
    max_files: usize,
    #[serde(default = "default_max_diff_lines")]
    max_diff_lines: usize,
    #[serde(default)]
    coder_instructions: String,
    #[serde(default)]
    retry: RetryPolicy,
}

#[derive(Debug, Default, Deserialize)]
struct Signals {
    #[serde(default)]
    keywords: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RetryPolicy {
    max_attempts: Option<u32>,
    #[serde(default)]
    on_fail: String,
}

fn default_difficulty() -> String {
    "easy".to_string()
}

fn default_max_files() -> usize {
    1
}

fn default_max_diff_lines() -> usize {
    3
}

impl From<TemplateFile> for Template {
    fn from(file: TemplateFile) -> Self {
        Self {
            id: file.id,
            name: file.name,
            difficulty: file.difficulty,
            description: file.description,
            keywords: file.signals.keywords,
            soft_aspects_menu: file.soft_aspects_menu,
            max_files: file.max_files,
            max_diff_lines: file.max_diff_lines,
            coder_instructions: file.coder_instructions,
            max_attempts: file.retry.max_attempts,
            on_fail: file.retry.on_fail,
        }
    }
}

impl Template {
    /// Parse one YAML document. `origin` is only used in error messages.
    pub fn from_yaml(origin: &str, yaml: &str) -> Result<Self, TemplateError> {
        let file: TemplateFile = serde_yaml::from_str(yaml).map_err(|e| TemplateError::Parse {
            path: origin.to_string(),
            reason: e.to_string(),
        })?;
        if file.id.trim().is_empty() {
            return Err(TemplateError::Parse {
                path: origin.to_string(),
                reason: "empty id".to_string(),
            });
        }
        Ok(file.into())
    }

    /// Number of keywords found in `text` (case-insensitive).
    pub fn keyword_hits(&self, text_lower: &str) -> usize {
        self.keywords
            .iter()
            .filter(|kw| text_lower.contains(&kw.to_lowercase()))
            .count()
    }
}

/// Ordered template set keyed by id.
#[derive(Debug, Clone, Default)]
pub struct TemplateLoader {
    templates: Vec<Template>,
}

impl TemplateLoader {
    /// Load every `*.yaml` in `dir`, in file-name order.
    ///
    /// A later file with an id already seen replaces the earlier one.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let dir = dir.as_ref();
        let read_dir = std::fs::read_dir(dir).map_err(|source| TemplateError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut paths: Vec<PathBuf> = read_dir
            .flatten()
            .map(|entry| entry.path())
            .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some("yaml"))
            .collect();
        paths.sort();

        let mut loader = Self::default();
        for path in &paths {
            let yaml = std::fs::read_to_string(path).map_err(|source| TemplateError::Io {
                path: path.clone(),
                source,
            })?;
            loader.insert(Template::from_yaml(&path.display().to_string(), &yaml)?);
        }

        if loader.templates.is_empty() {
            return Err(TemplateError::Empty(dir.display().to_string()));
        }
        tracing::debug!(dir = %dir.display(), count = loader.templates.len(), "Templates loaded");
        Ok(loader)
    }

    /// Templates compiled into the crate.
    pub fn builtin() -> Result<Self, TemplateError> {
        let mut loader = Self::default();
        for (name, yaml) in BUILTIN {
            loader.insert(Template::from_yaml(name, yaml)?);
        }
        Ok(loader)
    }

    pub fn from_templates(templates: Vec<Template>) -> Self {
        let mut loader = Self::default();
        for template in templates {
            loader.insert(template);
        }
        loader
    }

    fn insert(&mut self, template: Template) {
        if let Some(existing) = self.templates.iter_mut().find(|t| t.id == template.id) {
            tracing::warn!(id = %template.id, "Duplicate template id, later file wins");
            *existing = template;
        } else {
            self.templates.push(template);
        }
    }

    pub fn get(&self, id: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn all(&self) -> &[Template] {
        &self.templates
    }

    pub fn ids(&self) -> Vec<&str> {
        self.templates.iter().map(|t| t.id.as_str()).collect()
    }

    /// Templates with at least one keyword hit, best first. Ties keep load order.
    pub fn match_text(&self, text: &str) -> Vec<(&Template, usize)> {
        let lower = text.to_lowercase();
        let mut scored: Vec<(&Template, usize)> = self
            .templates
            .iter()
            .map(|t| (t, t.keyword_hits(&lower)))
            .filter(|(_, score)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored
    }

    /// The template for a classifier's choice.
    ///
    /// Exact id first, then the best keyword match on `issue_text`, then the
    /// first loaded template.
    pub fn resolve(&self, template_id: &str, issue_text: &str) -> Option<&Template> {
        if let Some(template) = self.get(template_id) {
            return Some(template);
        }
        let fallback = self
            .match_text(issue_text)
            .first()
            .map(|(t, _)| *t)
            .or_else(|| self.templates.first());
        if let Some(t) = fallback {
            tracing::warn!(requested = template_id, resolved = %t.id, "Unknown template id");
        }
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_templates_parse() {
        let loader = TemplateLoader::builtin().unwrap();
        assert_eq!(
            loader.ids(),
            vec!["missing_guard", "off_by_one", "typo_fix", "wrong_value"]
        );
        let wrong = loader.get("wrong_value").unwrap();
        assert_eq!(wrong.max_files, 1);
        assert_eq!(wrong.max_diff_lines, 3);
        assert_eq!(wrong.max_attempts, Some(2));
        assert!(wrong.keywords.contains(&"should be".to_string()));
    }

    #[test]
    fn test_defaults_when_fields_absent() {
        let t = Template::from_yaml("min.yaml", "id: minimal\nname: Minimal\n").unwrap();
        assert_eq!(t.difficulty, "easy");
        assert_eq!(t.max_files, 1);
        assert_eq!(t.max_diff_lines, 3);
        assert_eq!(t.max_attempts, None);
        assert!(t.keywords.is_empty());
    }

    #[test]
    fn test_missing_id_is_parse_error() {
        let err = Template::from_yaml("bad.yaml", "name: No id\n").unwrap_err();
        assert!(matches!(err, TemplateError::Parse { .. }));
    }

    #[test]
    fn test_match_text_orders_by_hits() {
        let loader = TemplateLoader::builtin().unwrap();
        let matches = loader.match_text("The default is 0.50 but should be 0.85");
        assert_eq!(matches[0].0.id, "wrong_value");
        assert_eq!(matches[0].1, 2);
        assert!(loader.match_text("completely unrelated").is_empty());
    }

    #[test]
    fn test_resolve_fallbacks() {
        let loader = TemplateLoader::builtin().unwrap();
        assert_eq!(loader.resolve("typo_fix", "").unwrap().id, "typo_fix");
        assert_eq!(
            loader.resolve("made_up", "there is a typo here").unwrap().id,
            "typo_fix"
        );
        assert_eq!(
            loader.resolve("made_up", "zzz").unwrap().id,
            "missing_guard"
        );
        assert!(TemplateLoader::default().resolve("x", "y").is_none());
    }

    #[test]
    fn test_from_dir_sorted_and_last_wins() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.yaml"), "id: dup\nname: Second\n").unwrap();
        std::fs::write(dir.path().join("a.yaml"), "id: dup\nname: First\n").unwrap();
        std::fs::write(dir.path().join("c.yaml"), "id: other\nname: Other\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let loader = TemplateLoader::from_dir(dir.path()).unwrap();
        assert_eq!(loader.ids(), vec!["dup", "other"]);
        assert_eq!(loader.get("dup").unwrap().name, "Second");
    }

    #[test]
    fn test_from_dir_empty_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            TemplateLoader::from_dir(dir.path()),
            Err(TemplateError::Empty(_))
        ));
    }
}
