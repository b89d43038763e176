//! Code mutator: applies line-range replacements to files in a working tree.
//!
//! Edits are applied in order. A failing edit stops the sequence and is
//! reported, but edits already written stay on disk: callers that need
//! atomicity reset the working tree instead.
//!
//! # Modules
//!
//! - [`edit`]: `LineEdit` and `Fix`
//! - [`indent`]: indentation transfer for replacement text
//! - [`fuzzy`]: similarity-based line locator

pub mod edit;
pub mod fuzzy;
pub mod indent;

use std::ffi::OsStr;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use ignore::WalkBuilder;
use thiserror::Error;

pub use edit::{Fix, LineEdit};
pub use fuzzy::{fuzzy_find, similarity, DEFAULT_FUZZY_THRESHOLD};

/// Directories never searched by the basename fallback.
const SKIP_DIRS: &[&str] = &[".git", "__pycache__", "target", "node_modules", ".venv"];

/// Error applying an edit.
#[derive(Debug, Error)]
pub enum MutationError {
    #[error("File not found: {file}")]
    FileNotFound { file: String },

    #[error("Path escapes the working tree: {file}")]
    OutsideRoot { file: String },

    #[error("Line range {start}-{end} out of bounds ({lines} lines)")]
    OutOfBounds {
        start: usize,
        end: usize,
        lines: usize,
    },

    #[error("Line range {start}-{end} is inverted")]
    InvertedRange { start: usize, end: usize },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Edit {index}/{total} failed: {source}")]
    EditFailed {
        index: usize,
        total: usize,
        #[source]
        source: Box<MutationError>,
    },
}

/// What one successful edit did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedEdit {
    /// Resolved path (may differ from the requested one after basename healing).
    pub path: PathBuf,
    pub lines_removed: usize,
    pub lines_inserted: usize,
}

/// Applies [`LineEdit`]s under a fixed root directory.
#[derive(Debug, Clone)]
pub struct CodeMutator {
    root: PathBuf,
}

impl CodeMutator {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `file` under the root.
    ///
    /// Falls back to the first file with the same basename (walk sorted by
    /// name) when the exact path does not exist.
    pub fn resolve(&self, file: &str) -> Result<PathBuf, MutationError> {
        let relative = checked_relative(file)?;
        let direct = self.root.join(relative);
        if direct.is_file() {
            return Ok(direct);
        }

        let Some(name) = relative.file_name().map(OsStr::to_os_string) else {
            return Err(MutationError::FileNotFound {
                file: file.to_string(),
            });
        };

        let walker = WalkBuilder::new(&self.root)
            .hidden(false)
            .ignore(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .parents(false)
            .filter_entry(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .map_or(true, |n| !SKIP_DIRS.contains(&n))
            })
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        let healed = walker
            .flatten()
            .find(|entry| {
                entry.file_type().is_some_and(|t| t.is_file()) && entry.file_name() == name.as_os_str()
            })
            .map(|entry| entry.into_path());

        match healed {
            Some(path) => {
                tracing::info!(requested = file, resolved = %path.display(), "Healed edit path by basename");
                Ok(path)
            }
            None => Err(MutationError::FileNotFound {
                file: file.to_string(),
            }),
        }
    }

    /// Apply one edit.
    pub fn apply(&self, edit: &LineEdit) -> Result<AppliedEdit, MutationError> {
        let path = self.resolve(&edit.file)?;
        let content = std::fs::read_to_string(&path).map_err(|source| MutationError::Io {
            path: path.clone(),
            source,
        })?;

        let (updated, applied) = splice(&content, edit)?;
        std::fs::write(&path, updated).map_err(|source| MutationError::Io {
            path: path.clone(),
            source,
        })?;

        tracing::debug!(
            file = %path.display(),
            start = edit.start_line,
            end = edit.end_line,
            inserted = applied.1,
            "Applied line edit"
        );

        Ok(AppliedEdit {
            path,
            lines_removed: applied.0,
            lines_inserted: applied.1,
        })
    }

    /// Apply edits in order, stopping at the first failure. No rollback.
    pub fn apply_all(&self, edits: &[LineEdit]) -> Result<Vec<AppliedEdit>, MutationError> {
        let total = edits.len();
        let mut applied = Vec::with_capacity(total);
        for (i, edit) in edits.iter().enumerate() {
            match self.apply(edit) {
                Ok(done) => applied.push(done),
                Err(e) => {
                    tracing::warn!(index = i + 1, total, error = %e, "Edit sequence aborted");
                    return Err(MutationError::EditFailed {
                        index: i + 1,
                        total,
                        source: Box::new(e),
                    });
                }
            }
        }
        Ok(applied)
    }

    /// Append generated test code to `file`, creating it and its parents.
    pub fn write_test_file(&self, file: &str, code: &str) -> Result<PathBuf, MutationError> {
        let path = self.root.join(checked_relative(file)?);
        let io_err = |source: std::io::Error| MutationError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let existing = match std::fs::read_to_string(&path) {
            Ok(existing) => existing,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(io_err(e)),
        };
        let mut handle = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;

        let mut block = String::new();
        if !existing.is_empty() {
            if !existing.ends_with('\n') {
                block.push('\n');
            }
            block.push('\n');
        }
        block.push_str(code.trim_end());
        block.push('\n');
        handle.write_all(block.as_bytes()).map_err(io_err)?;

        Ok(path)
    }
}

/// Reject absolute paths and parent-directory hops.
fn checked_relative(file: &str) -> Result<&Path, MutationError> {
    let path = Path::new(file);
    let escapes = path
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if escapes {
        return Err(MutationError::OutsideRoot {
            file: file.to_string(),
        });
    }
    Ok(path)
}

/// Replace the edit's range inside `content`.
///
/// Returns the new content and `(lines_removed, lines_inserted)`.
fn splice(content: &str, edit: &LineEdit) -> Result<(String, (usize, usize)), MutationError> {
    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    let count = lines.len();

    if edit.start_line < 1 || edit.end_line > count {
        return Err(MutationError::OutOfBounds {
            start: edit.start_line,
            end: edit.end_line,
            lines: count,
        });
    }
    if edit.end_line < edit.start_line {
        return Err(MutationError::InvertedRange {
            start: edit.start_line,
            end: edit.end_line,
        });
    }

    let region = &lines[edit.start_line - 1..edit.end_line];
    let first = region[0];
    let eol = if first.ends_with("\r\n") { "\r\n" } else { "\n" };
    let terminated = region.last().is_some_and(|l| l.ends_with('\n'));
    let first_body = first.trim_end_matches(['\r', '\n']);
    let original_indent = indent::leading_whitespace(first_body);

    let replacement = indent::reindent(original_indent, &edit.new_text);

    let mut out = String::with_capacity(content.len() + edit.new_text.len());
    for line in &lines[..edit.start_line - 1] {
        out.push_str(line);
    }
    let inserted = replacement.len();
    for (i, line) in replacement.iter().enumerate() {
        out.push_str(line);
        if i + 1 < inserted || terminated {
            out.push_str(eol);
        }
    }
    for line in &lines[edit.end_line..] {
        out.push_str(line);
    }

    Ok((out, (region.len(), inserted)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tree(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(full, content).unwrap();
        }
        dir
    }

    fn read(dir: &TempDir, path: &str) -> String {
        std::fs::read_to_string(dir.path().join(path)).unwrap()
    }

    #[test]
    fn test_indentation_reapplied() {
        let dir = tree(&[("pkg/mod.py", "def f():\n    return x\n")]);
        let mutator = CodeMutator::new(dir.path());
        mutator
            .apply(&LineEdit::new("pkg/mod.py", 2, 2, "return y"))
            .unwrap();
        assert_eq!(read(&dir, "pkg/mod.py"), "def f():\n    return y\n");
    }

    #[test]
    fn test_start_zero_is_out_of_bounds() {
        let dir = tree(&[("a.py", "x = 1\n")]);
        let err = CodeMutator::new(dir.path())
            .apply(&LineEdit::new("a.py", 0, 1, "x = 2"))
            .unwrap_err();
        assert_eq!(err.to_string(), "Line range 0-1 out of bounds (1 lines)");
        assert_eq!(read(&dir, "a.py"), "x = 1\n");
    }

    #[test]
    fn test_end_past_eof_is_out_of_bounds() {
        let dir = tree(&[("a.py", "x = 1\ny = 2\n")]);
        let err = CodeMutator::new(dir.path())
            .apply(&LineEdit::new("a.py", 2, 3, "y = 3"))
            .unwrap_err();
        assert!(matches!(
            err,
            MutationError::OutOfBounds {
                start: 2,
                end: 3,
                lines: 2
            }
        ));
    }

    #[test]
    fn test_inverted_range_rejected() {
        let dir = tree(&[("a.py", "a\nb\nc\n")]);
        let err = CodeMutator::new(dir.path())
            .apply(&LineEdit::new("a.py", 3, 2, "z"))
            .unwrap_err();
        assert!(matches!(err, MutationError::InvertedRange { .. }));
    }

    #[test]
    fn test_missing_file() {
        let dir = tree(&[("a.py", "x\n")]);
        let err = CodeMutator::new(dir.path())
            .apply(&LineEdit::new("nope/missing.py", 1, 1, "y"))
            .unwrap_err();
        assert_eq!(err.to_string(), "File not found: nope/missing.py");
    }

    #[test]
    fn test_basename_fallback_heals_path() {
        let dir = tree(&[("src/glassbox/trust_db.py", "SCORE = 0.50\n")]);
        let mutator = CodeMutator::new(dir.path());
        let applied = mutator
            .apply(&LineEdit::new("glassbox/trust_db.py", 1, 1, "SCORE = 0.85\n"))
            .unwrap();
        assert!(applied.path.ends_with("src/glassbox/trust_db.py"));
        assert_eq!(read(&dir, "src/glassbox/trust_db.py"), "SCORE = 0.85\n");
    }

    #[test]
    fn test_basename_fallback_skips_cache_dirs() {
        let dir = tree(&[
            ("__pycache__/util.py", "cached\n"),
            ("zlib/util.py", "real\n"),
        ]);
        let resolved = CodeMutator::new(dir.path()).resolve("util.py").unwrap();
        assert!(resolved.ends_with("zlib/util.py"));
    }

    #[test]
    fn test_parent_dir_rejected() {
        let dir = tree(&[("a.py", "x\n")]);
        let err = CodeMutator::new(dir.path())
            .resolve("../etc/passwd")
            .unwrap_err();
        assert!(matches!(err, MutationError::OutsideRoot { .. }));
    }

    #[test]
    fn test_multiline_replacement_and_deletion() {
        let dir = tree(&[("a.py", "def f(x):\n    a = 1\n    b = 2\n    return a\n")]);
        let mutator = CodeMutator::new(dir.path());
        mutator
            .apply(&LineEdit::new("a.py", 2, 3, "if x:\n    a = 2\n"))
            .unwrap();
        assert_eq!(
            read(&dir, "a.py"),
            "def f(x):\n    if x:\n        a = 2\n    return a\n"
        );
        mutator.apply(&LineEdit::new("a.py", 2, 3, "")).unwrap();
        assert_eq!(read(&dir, "a.py"), "def f(x):\n    return a\n");
    }

    #[test]
    fn test_no_trailing_newline_preserved() {
        let dir = tree(&[("a.py", "x = 1\ny = 2")]);
        CodeMutator::new(dir.path())
            .apply(&LineEdit::new("a.py", 2, 2, "y = 3\n"))
            .unwrap();
        assert_eq!(read(&dir, "a.py"), "x = 1\ny = 3");
    }

    #[test]
    fn test_crlf_line_endings_kept() {
        let dir = tree(&[("a.py", "a = 1\r\nb = 2\r\n")]);
        CodeMutator::new(dir.path())
            .apply(&LineEdit::new("a.py", 1, 1, "a = 5"))
            .unwrap();
        assert_eq!(read(&dir, "a.py"), "a = 5\r\nb = 2\r\n");
    }

    #[test]
    fn test_apply_all_stops_at_first_failure() {
        let dir = tree(&[("a.py", "one\ntwo\nthree\n")]);
        let mutator = CodeMutator::new(dir.path());
        let edits = vec![
            LineEdit::new("a.py", 1, 1, "ONE"),
            LineEdit::new("a.py", 9, 9, "NINE"),
            LineEdit::new("a.py", 3, 3, "THREE"),
        ];
        let err = mutator.apply_all(&edits).unwrap_err();
        assert!(err
            .to_string()
            .starts_with("Edit 2/3 failed: Line range 9-9 out of bounds"));
        assert_eq!(read(&dir, "a.py"), "ONE\ntwo\nthree\n");
    }

    #[test]
    fn test_write_test_file_appends() {
        let dir = tree(&[]);
        let mutator = CodeMutator::new(dir.path());
        mutator
            .write_test_file("tests/test_issue_7.py", "def test_a():\n    assert True")
            .unwrap();
        mutator
            .write_test_file("tests/test_issue_7.py", "def test_b():\n    assert True\n")
            .unwrap();
        assert_eq!(
            read(&dir, "tests/test_issue_7.py"),
            "def test_a():\n    assert True\n\ndef test_b():\n    assert True\n"
        );
    }

    #[test]
    fn test_write_test_file_keeps_unreadable_file() {
        let dir = tree(&[]);
        std::fs::create_dir_all(dir.path().join("tests")).unwrap();
        let path = dir.path().join("tests/test_issue_7.py");
        std::fs::write(&path, [0xff, 0xfe, b'\n']).unwrap();

        let err = CodeMutator::new(dir.path())
            .write_test_file("tests/test_issue_7.py", "def test_a():\n    assert True\n")
            .unwrap_err();
        assert!(matches!(err, MutationError::Io { .. }));
        assert_eq!(std::fs::read(&path).unwrap(), vec![0xff, 0xfe, b'\n']);
    }
}
