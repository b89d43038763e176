//! Indentation transfer for replacement text.
//!
//! The first non-blank replacement line takes the original line's indent.
//! Every later non-blank line keeps whatever indentation it has *beyond*
//! that first line, stacked on the original indent. Whitespace-only lines
//! pass through untouched.

/// Leading whitespace of `line`.
pub fn leading_whitespace(line: &str) -> &str {
    let end = line
        .char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map(|(i, _)| i)
        .unwrap_or(line.len());
    &line[..end]
}

/// Split replacement text into lines without terminators.
///
/// A single trailing newline does not produce an extra empty line, and an
/// empty string yields no lines at all.
pub fn replacement_lines(new_text: &str) -> Vec<&str> {
    if new_text.is_empty() {
        return Vec::new();
    }
    let body = new_text.strip_suffix('\n').unwrap_or(new_text);
    body.split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .collect()
}

/// Re-indent `new_text` under `original_indent`, preserving relative structure.
pub fn reindent(original_indent: &str, new_text: &str) -> Vec<String> {
    let lines = replacement_lines(new_text);
    let anchor_width = lines
        .iter()
        .find(|l| !l.trim().is_empty())
        .map(|l| leading_whitespace(l).chars().count())
        .unwrap_or(0);

    lines
        .iter()
        .map(|line| {
            if line.trim().is_empty() {
                return (*line).to_string();
            }
            let own = leading_whitespace(line);
            let extra: String = own.chars().skip(anchor_width).collect();
            format!("{original_indent}{extra}{}", line.trim_start())
        })
        .collect()
}
