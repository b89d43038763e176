//! Tester: renders a validation result for the issue thread.
//!
//! Validation itself lives in `coordination::verifier`; this module only
//! formats what it found.

use coordination::triage::EdgeCase;
use coordination::verifier::TestResult;

/// Failures listed in a report.
const MAX_REPORTED_FAILURES: usize = 5;
/// Characters kept from each failure message.
const MAX_FAILURE_CHARS: usize = 200;

/// Markdown report: TP1/TP2/TP3 table, edge cases, failures, verdict.
pub fn format_report(result: &TestResult, edge_cases: &[EdgeCase], max_diff_lines: usize) -> String {
    let mut lines = vec!["| Check | Result |".to_string(), "|-------|--------|".to_string()];

    if result.syntax_error.is_some() {
        lines.push("| TP1 Syntax | FAILED |".into());
    } else {
        lines.push("| TP1 Syntax | OK |".into());
    }

    if result.passed {
        lines.push(format!("| TP2 Full suite | {} passed |", result.total));
    } else if result.syntax_error.is_some() {
        lines.push("| TP2 Full suite | not run |".into());
    } else {
        lines.push(format!(
            "| TP2 Full suite | {} failed / {} total |",
            result.failures.len(),
            result.total
        ));
    }

    let diff_status = if result.diff_within_budget(max_diff_lines) {
        "OK"
    } else {
        "WARN"
    };
    lines.push(format!(
        "| TP3 Diff size | {diff_status} {} lines (max {max_diff_lines}) |",
        result.diff_lines
    ));

    if !edge_cases.is_empty() {
        lines.push(String::new());
        lines.push("**Edge cases checked:**".into());
        let status = if result.passed { "[x]" } else { "[ ]" };
        for ec in edge_cases {
            lines.push(format!(
                "- {status} {}: `{}` -> {}",
                ec.tier, ec.scenario, ec.expected
            ));
        }
    }

    if !result.failures.is_empty() {
        lines.push(String::new());
        lines.push("**Failures:**".into());
        for f in result.failures.iter().take(MAX_REPORTED_FAILURES) {
            let message: String = f.message.chars().take(MAX_FAILURE_CHARS).collect();
            lines.push(format!("- `{}`: {message}", f.test_name));
        }
    }

    lines.push(String::new());
    if result.passed {
        lines.push("All green. **Manager**, your call.".into());
    } else {
        lines.push("Fix needs work. **Junior Dev**, please retry.".into());
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordination::triage::EdgeTier;
    use coordination::verifier::TestFailure;

    fn green() -> TestResult {
        TestResult {
            passed: true,
            total: 4,
            failures: vec![],
            output: "4 passed".into(),
            diff_lines: 1,
            syntax_error: None,
            gates: vec![],
        }
    }

    #[test]
    fn test_green_report() {
        let cases = [EdgeCase {
            tier: EdgeTier::T1,
            scenario: "new agent".into(),
            expected: "0.85".into(),
        }];
        let text = format_report(&green(), &cases, 3);
        assert!(text.contains("| TP1 Syntax | OK |"));
        assert!(text.contains("| TP2 Full suite | 4 passed |"));
        assert!(text.contains("| TP3 Diff size | OK 1 lines (max 3) |"));
        assert!(text.contains("- [x] T1: `new agent` -> 0.85"));
        assert!(text.ends_with("All green. **Manager**, your call."));
    }

    #[test]
    fn test_failure_list_is_capped_and_truncated() {
        let long = "e".repeat(450);
        let result = TestResult {
            passed: false,
            total: 9,
            failures: (0..7).map(|i| TestFailure::new(&format!("t{i}"), &long)).collect(),
            output: String::new(),
            diff_lines: 6,
            syntax_error: None,
            gates: vec![],
        };
        let text = format_report(&result, &[], 3);
        assert!(text.contains("| TP2 Full suite | 7 failed / 9 total |"));
        assert!(text.contains("| TP3 Diff size | WARN 6 lines (max 3) |"));
        assert!(text.contains("- `t4`: "));
        assert!(!text.contains("- `t5`: "));
        let first = text.lines().find(|l| l.starts_with("- `t0`")).unwrap();
        assert_eq!(first.len(), "- `t0`: ".len() + 200);
        assert!(text.ends_with("please retry."));
    }

    #[test]
    fn test_syntax_failure_report() {
        let mut result = TestResult::failed("TP1_syntax", "SyntaxError: bad", "TP1 Syntax FAILED".into());
        result.syntax_error = Some("SyntaxError: bad".into());
        let text = format_report(&result, &[], 3);
        assert!(text.contains("| TP1 Syntax | FAILED |"));
        assert!(text.contains("| TP2 Full suite | not run |"));
    }
}
