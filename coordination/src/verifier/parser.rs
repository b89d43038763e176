//! Test-runner output parsing.
//!
//! Understands pytest (`N passed, M failed` summaries and `FAILED path::name - msg`
//! short-summary lines) and cargo test (`test result:` lines, `test x ... FAILED`
//! and panic locations).

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use super::report::TestFailure;

static PASSED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+) passed").expect("PASSED regex should compile"));
static FAILED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+) failed").expect("FAILED regex should compile"));
static ERRORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+) errors?\b").expect("ERRORS regex should compile"));
static PYTEST_FAILED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:FAILED|ERROR)\s+([\w/.\-]+)::(\S+?(?:\[[^\]]*\])?)(?:\s+[-–]\s+(.*))?$")
        .expect("PYTEST_FAILED regex should compile")
});
static CARGO_FAILED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^test (\S+) \.\.\. FAILED$").expect("CARGO_FAILED regex should compile"));
static PANIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^thread '([^']+)' panicked at ([^:]+):(\d+):\d+:?\s*(.*)$")
        .expect("PANIC regex should compile")
});

/// Counts and failures extracted from runner output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedRun {
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub failures: Vec<TestFailure>,
}

impl ParsedRun {
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.errors
    }
}

/// Parse combined stdout/stderr of a test run.
pub fn parse_output(output: &str) -> ParsedRun {
    let mut run = ParsedRun::default();
    let panics = panic_sites(output);

    for line in output.lines() {
        let trimmed = line.trim_end();
        if is_summary_line(trimmed) {
            run.passed += sum_captures(&PASSED, trimmed);
            run.failed += sum_captures(&FAILED, trimmed);
            run.errors += sum_captures(&ERRORS, trimmed);
        }

        if let Some(caps) = PYTEST_FAILED.captures(trimmed) {
            run.failures.push(TestFailure {
                test_name: caps[2].to_string(),
                message: caps
                    .get(3)
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default(),
                file: Some(caps[1].to_string()),
                line: None,
            });
        } else if let Some(caps) = CARGO_FAILED.captures(trimmed) {
            let name = caps[1].to_string();
            let mut failure = TestFailure::new(&name, "FAILED");
            if let Some((file, line, message)) = panics.get(name.as_str()) {
                failure.file = Some(file.clone());
                failure.line = Some(*line);
                if !message.is_empty() {
                    failure.message = message.clone();
                }
            }
            run.failures.push(failure);
        }
    }

    run
}

/// Last `n` lines of `output`, joined with newlines.
pub fn tail(output: &str, n: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

/// pytest `=== ... ===` banners or cargo `test result:` lines.
fn is_summary_line(line: &str) -> bool {
    let line = line.trim();
    line.starts_with("test result:")
        || (line.starts_with('=') && line.ends_with('=') && line.contains(" in "))
        || (line.contains(" in ") && (PASSED.is_match(line) || FAILED.is_match(line)))
}

fn sum_captures(re: &Regex, line: &str) -> usize {
    re.captures_iter(line)
        .filter_map(|c| c[1].parse::<usize>().ok())
        .sum()
}

/// Map cargo test name to `(file, line, message)` from panic lines.
///
/// The message is either inline after the location or on the following line.
fn panic_sites(output: &str) -> HashMap<&str, (String, u32, String)> {
    let mut sites = HashMap::new();
    let lines: Vec<&str> = output.lines().collect();
    for (i, line) in lines.iter().enumerate() {
        if let Some(caps) = PANIC.captures(line.trim_end()) {
            let (Some(name), Some(file), Some(line_no)) = (caps.get(1), caps.get(2), caps.get(3))
            else {
                continue;
            };
            let inline = caps.get(4).map(|m| m.as_str().trim()).unwrap_or("");
            let message = if inline.is_empty() {
                lines
                    .get(i + 1)
                    .map(|l| l.trim().to_string())
                    .unwrap_or_default()
            } else {
                inline.to_string()
            };
            sites.insert(
                name.as_str(),
                (
                    file.as_str().to_string(),
                    line_no.as_str().parse().unwrap_or(0),
                    message,
                ),
            );
        }
    }
    sites
}
