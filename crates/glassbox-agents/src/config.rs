//! Runtime settings.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. Environment variable overrides (e.g. `GLASSBOX_MODEL`)
//! 2. Values from the TOML file passed with `--config`
//! 3. Built-in defaults
//!
//! | Field              | Default                                   | Env                      |
//! |--------------------|-------------------------------------------|--------------------------|
//! | repo               | `agentic-trust-labs/glassbox-ai`          | `GITHUB_REPOSITORY`      |
//! | model              | `gpt-4o`                                  | `GLASSBOX_MODEL`         |
//! | api_base           | `https://api.openai.com/v1`               | `OPENAI_BASE_URL`        |
//! | api_key            | none                                      | `OPENAI_API_KEY`         |
//! | templates_dir      | `templates`                               | `GLASSBOX_TEMPLATES_DIR` |
//! | reflections_path   | `data/reflections.json`                   | `GLASSBOX_REFLECTIONS`   |
//! | trust_path         | `data/trust_scores.json`                  | `GLASSBOX_TRUST_DB`      |
//! | test_command       | `python -m pytest tests/ -v --tb=short`   | `GLASSBOX_TEST_COMMAND`  |
//! | ack_comment_id     | `0`                                       | `ACK_COMMENT_ID`         |

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use coordination::template::TemplateLoader;
use coordination::verifier::ValidatorConfig;
use serde::{Deserialize, Serialize};

const ENV_REPO: &str = "GITHUB_REPOSITORY";
const ENV_MODEL: &str = "GLASSBOX_MODEL";
const ENV_API_BASE: &str = "OPENAI_BASE_URL";
const ENV_API_KEY: &str = "OPENAI_API_KEY";
const ENV_TEMPLATES_DIR: &str = "GLASSBOX_TEMPLATES_DIR";
const ENV_REFLECTIONS: &str = "GLASSBOX_REFLECTIONS";
const ENV_TRUST_DB: &str = "GLASSBOX_TRUST_DB";
const ENV_TEST_COMMAND: &str = "GLASSBOX_TEST_COMMAND";
const ENV_ACK_COMMENT_ID: &str = "ACK_COMMENT_ID";

/// Top-level glassbox configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// `owner/name` of the repository issues are read from.
    pub repo: String,
    pub model: String,
    /// OpenAI-compatible base URL.
    pub api_base: String,
    /// Never read from the TOML file.
    #[serde(skip)]
    pub api_key: Option<String>,
    pub temperature_classify: f32,
    pub temperature_code: f32,
    pub temperature_review: f32,
    /// Retry budget for templates that do not set `retry.max_attempts`.
    pub max_retries: u32,
    pub templates_dir: PathBuf,
    pub reflections_path: PathBuf,
    pub trust_path: PathBuf,
    /// Only files under this prefix are shown to the agents.
    pub source_prefix: String,
    pub source_extensions: Vec<String>,
    pub syntax_command: Option<String>,
    pub test_command: String,
    pub test_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_feedback_failures: usize,
    /// Comment that acknowledged the issue; edited in place instead of posting.
    pub ack_comment_id: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            repo: "agentic-trust-labs/glassbox-ai".into(),
            model: "gpt-4o".into(),
            api_base: "https://api.openai.com/v1".into(),
            api_key: None,
            temperature_classify: 0.3,
            temperature_code: 0.1,
            temperature_review: 0.3,
            max_retries: 2,
            templates_dir: PathBuf::from("templates"),
            reflections_path: PathBuf::from("data/reflections.json"),
            trust_path: PathBuf::from("data/trust_scores.json"),
            source_prefix: "src/".into(),
            source_extensions: vec!["py".into()],
            syntax_command: Some("python -c \"import {module}\"".into()),
            test_command: "python -m pytest tests/ -v --tb=short".into(),
            test_timeout_secs: 300,
            request_timeout_secs: 120,
            max_feedback_failures: coordination::feedback::DEFAULT_MAX_FAILURES,
            ack_comment_id: 0,
        }
    }
}

impl Settings {
    /// Defaults, then the optional TOML file, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                Self::from_toml_str(&text)
                    .with_context(|| format!("Failed to parse config {}", path.display()))?
            }
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Apply environment overrides through `lookup` so tests need not touch
    /// the real process environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get(ENV_REPO) {
            self.repo = v;
        }
        if let Some(v) = get(ENV_MODEL) {
            self.model = v;
        }
        if let Some(v) = get(ENV_API_BASE) {
            self.api_base = v;
        }
        if let Some(v) = get(ENV_API_KEY) {
            self.api_key = Some(v);
        }
        if let Some(v) = get(ENV_TEMPLATES_DIR) {
            self.templates_dir = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_REFLECTIONS) {
            self.reflections_path = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_TRUST_DB) {
            self.trust_path = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_TEST_COMMAND) {
            self.test_command = v;
        }
        if let Some(v) = get(ENV_ACK_COMMENT_ID) {
            match v.parse() {
                Ok(id) => self.ack_comment_id = id,
                Err(_) => tracing::warn!(value = %v, "Ignoring non-numeric {ENV_ACK_COMMENT_ID}"),
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validator_config(&self) -> ValidatorConfig {
        ValidatorConfig {
            syntax_command: self.syntax_command.clone(),
            modules: Vec::new(),
            test_command: self.test_command.clone(),
            timeout_secs: self.test_timeout_secs,
            ..ValidatorConfig::default()
        }
    }

    /// Templates from `templates_dir`, or the built-in set when it is absent.
    pub fn load_templates(&self) -> Result<TemplateLoader> {
        if self.templates_dir.is_dir() {
            TemplateLoader::from_dir(&self.templates_dir).with_context(|| {
                format!("Failed to load templates from {}", self.templates_dir.display())
            })
        } else {
            tracing::debug!(
                dir = %self.templates_dir.display(),
                "Templates dir missing, using built-in templates"
            );
            TemplateLoader::builtin().context("Failed to load built-in templates")
        }
    }
}
