//! Strict parse boundary for LLM output.
//!
//! Every model reply is parsed into a typed contract before the pipeline
//! touches it. Malformed replies are rejected (fail-closed) and surface as
//! [`ContractError`]; required structural fields are never defaulted.
//!
//! ## Contract schema
//!
//! ```text
//! TriageResult {                       Fix {
//!     template_id:     String,             edits:     [LineEdit; 1..],
//!     confidence:      0.0..=1.0,          summary:   String (non-empty),
//!     skip_reason:     Option<String>,     test_code: String = "",
//!     soft_aspects:    [..] = [],          strategy:  String = "",
//!     soft_challenges: [..] = [],      }
//!     edge_cases:      [..] = [],
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use coordination::json_block::extract_json_block;
use coordination::mutator::Fix;
use coordination::triage::{TriageError, TriageResult};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContractError {
    #[error("{what} response contained no JSON object")]
    NoJson { what: &'static str },

    #[error("malformed {what} JSON: {source}")]
    Malformed {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid triage: {0}")]
    Triage(#[from] TriageError),

    #[error("fix contains no edits")]
    NoEdits,

    #[error("edit {index} has invalid line range {start}-{end}")]
    BadRange {
        index: usize,
        start: usize,
        end: usize,
    },

    #[error("fix summary is empty")]
    EmptySummary,

    #[error("edit {index} targets unknown file {file}")]
    UnknownFile { index: usize, file: String },
}

fn json_of<'a>(raw: &'a str, what: &'static str) -> Result<&'a str, ContractError> {
    extract_json_block(raw).ok_or(ContractError::NoJson { what })
}

/// Parse and validate a classifier reply.
pub fn parse_triage(raw: &str) -> Result<TriageResult, ContractError> {
    let json = json_of(raw, "triage")?;
    let triage: TriageResult =
        serde_json::from_str(json).map_err(|source| ContractError::Malformed {
            what: "triage",
            source,
        })?;
    triage.validate()?;
    Ok(triage)
}

/// Parse and validate a fix reply against the sources shown to the model.
///
/// Edits naming a file outside `sources` are healed when exactly one source
/// shares the basename; anything else is rejected.
pub fn parse_fix(raw: &str, sources: &BTreeMap<String, String>) -> Result<Fix, ContractError> {
    let json = json_of(raw, "fix")?;
    let mut fix: Fix = serde_json::from_str(json).map_err(|source| ContractError::Malformed {
        what: "fix",
        source,
    })?;

    if fix.edits.is_empty() {
        return Err(ContractError::NoEdits);
    }
    if fix.summary.trim().is_empty() {
        return Err(ContractError::EmptySummary);
    }

    for (i, edit) in fix.edits.iter_mut().enumerate() {
        let index = i + 1;
        if edit.start_line < 1 || edit.end_line < edit.start_line {
            return Err(ContractError::BadRange {
                index,
                start: edit.start_line,
                end: edit.end_line,
            });
        }
        if sources.contains_key(&edit.file) {
            continue;
        }
        match heal_path(&edit.file, sources) {
            Some(healed) => {
                tracing::info!(requested = %edit.file, resolved = %healed, "Healed fix path");
                edit.file = healed;
            }
            None => {
                return Err(ContractError::UnknownFile {
                    index,
                    file: edit.file.clone(),
                })
            }
        }
    }

    Ok(fix)
}

/// The single source whose basename matches `file`.
fn heal_path(file: &str, sources: &BTreeMap<String, String>) -> Option<String> {
    let name = Path::new(file.trim_start_matches("./")).file_name()?;
    let mut matches = sources
        .keys()
        .filter(|path| Path::new(path.as_str()).file_name() == Some(name));
    let first = matches.next()?;
    matches.next().is_none().then(|| first.clone())
}
