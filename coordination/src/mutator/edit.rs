//! Line-addressed edits and the fix bundle that carries them.

use serde::{Deserialize, Serialize};

/// Replace the inclusive, 1-indexed line range `start_line..=end_line` of `file`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineEdit {
    /// Path relative to the working-tree root.
    pub file: String,
    pub start_line: usize,
    pub end_line: usize,
    /// Replacement text. Empty deletes the range.
    pub new_text: String,
}

impl LineEdit {
    pub fn new(file: &str, start_line: usize, end_line: usize, new_text: &str) -> Self {
        Self {
            file: file.to_string(),
            start_line,
            end_line,
            new_text: new_text.to_string(),
        }
    }

    /// Number of original lines this edit replaces.
    pub fn span(&self) -> usize {
        (self.end_line + 1).saturating_sub(self.start_line)
    }

    /// Larger of the replaced span and the replacement's line count.
    pub fn diff_line_count(&self) -> usize {
        let trimmed = self.new_text.trim();
        let inserted = if trimmed.is_empty() {
            0
        } else {
            trimmed.split('\n').count()
        };
        self.span().max(inserted)
    }
}

/// One attempt's worth of edits plus the rationale around them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fix {
    pub edits: Vec<LineEdit>,
    /// Optional test source appended to the test tree before validation.
    #[serde(default)]
    pub test_code: String,
    /// One-line commit subject.
    pub summary: String,
    #[serde(default)]
    pub strategy: String,
}

impl Fix {
    /// Sum of replaced spans across all edits.
    pub fn diff_lines(&self) -> usize {
        self.edits.iter().map(LineEdit::span).sum()
    }

    /// Distinct files touched, in first-seen order.
    pub fn files(&self) -> Vec<&str> {
        let mut files: Vec<&str> = Vec::new();
        for edit in &self.edits {
            if !files.contains(&edit.file.as_str()) {
                files.push(&edit.file);
            }
        }
        files
    }
}
