//! Argument and branch-name checks for the git/gh subprocess calls.
//!
//! Branch names and repository slugs flow into `git` and `gh` arguments.
//! Nothing here is passed through a shell, but a branch name that `git`
//! rejects halfway through a run leaves the working tree dirty, so names
//! are built and checked up front.

/// Characters that signal command chaining or substitution.
const INJECTION_CHARACTERS: &[char] = &[';', '|', '&', '`', '$', '(', ')', '\n', '\r'];

/// Characters `git check-ref-format` refuses anywhere in a ref.
const REF_FORBIDDEN: &[char] = &[' ', '~', '^', ':', '?', '*', '[', '\\'];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgError {
    #[error("dangerous character '{}' at position {position} in: {preview}", .character.escape_default())]
    Dangerous {
        character: char,
        position: usize,
        preview: String,
    },

    #[error("invalid branch name '{name}': {reason}")]
    BadBranch { name: String, reason: &'static str },
}

fn preview(arg: &str) -> String {
    if arg.chars().count() > 100 {
        format!("{}...", arg.chars().take(100).collect::<String>())
    } else {
        arg.to_string()
    }
}

/// Reject arguments carrying injection-class metacharacters.
pub fn validate_arg(arg: &str) -> Result<(), ArgError> {
    match arg
        .chars()
        .enumerate()
        .find(|(_, ch)| INJECTION_CHARACTERS.contains(ch))
    {
        Some((position, character)) => Err(ArgError::Dangerous {
            character,
            position,
            preview: preview(arg),
        }),
        None => Ok(()),
    }
}

/// Check a branch name against the rules of `git check-ref-format --branch`.
pub fn validate_branch_name(name: &str) -> Result<(), ArgError> {
    let bad = |reason| {
        Err(ArgError::BadBranch {
            name: preview(name),
            reason,
        })
    };

    if name.is_empty() {
        return bad("empty");
    }
    if name.starts_with('-') || name.starts_with('/') {
        return bad("must not start with '-' or '/'");
    }
    if name.ends_with('/') || name.ends_with('.') || name.ends_with(".lock") {
        return bad("must not end with '/', '.' or '.lock'");
    }
    if name.contains("..") || name.contains("//") || name.contains("@{") || name == "@" {
        return bad("contains '..', '//' or '@{'");
    }
    if name
        .chars()
        .any(|c| c.is_ascii_control() || REF_FORBIDDEN.contains(&c))
    {
        return bad("contains a character git forbids in refs");
    }
    if name.split('/').any(|part| part.starts_with('.')) {
        return bad("path component starts with '.'");
    }
    validate_arg(name)
}

/// Branch that carries the fix for one issue.
pub fn branch_for_issue(issue_number: u64) -> String {
    format!("agent/issue-{issue_number}")
}
