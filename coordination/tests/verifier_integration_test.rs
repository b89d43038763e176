//! Validator against real subprocesses.
//!
//! Commands are `sh -c` snippets that print runner-shaped output, so these
//! tests need no Python toolchain. A marker file records whether the test
//! command ever ran.

use coordination::mutator::{Fix, LineEdit};
use coordination::triage::{EdgeCase, EdgeTier};
use coordination::verifier::report::{Gate, GateOutcome};
use coordination::verifier::{Validator, ValidatorConfig, ValidatorError};

fn fix() -> Fix {
    Fix {
        edits: vec![LineEdit::new("pkg/config.py", 1, 1, "DEFAULT = 0.85")],
        test_code: String::new(),
        summary: "raise default".to_string(),
        strategy: String::new(),
    }
}

fn config(syntax: Option<&str>, tests: &str) -> ValidatorConfig {
    ValidatorConfig {
        syntax_command: syntax.map(str::to_string),
        modules: Vec::new(),
        test_command: tests.to_string(),
        timeout_secs: 30,
        tail_lines: 15,
    }
}

#[tokio::test]
async fn test_syntax_failure_never_runs_tests() {
    let dir = tempfile::tempdir().unwrap();
    let validator = Validator::new(
        dir.path(),
        config(
            Some("sh -c 'echo \"SyntaxError in {module}\" >&2; exit 1'"),
            "sh -c 'touch ran_tests; echo \"3 passed\"'",
        ),
    );

    let result = validator.validate(&fix(), &[]).await.unwrap();

    assert!(!result.passed);
    assert_eq!(result.total, 0);
    assert!(!result.tests_ran());
    assert_eq!(result.failures[0].test_name, "TP1_syntax");
    assert!(result.output.starts_with("TP1 Syntax FAILED:"));
    assert!(result
        .syntax_error
        .as_deref()
        .unwrap()
        .contains("SyntaxError in pkg.config"));
    assert_eq!(
        result.gate(Gate::Tests).map(|g| g.outcome),
        Some(GateOutcome::Skipped)
    );
    assert!(!dir.path().join("ran_tests").exists());
}

#[tokio::test]
async fn test_passing_run() {
    let dir = tempfile::tempdir().unwrap();
    let validator = Validator::new(
        dir.path(),
        config(
            Some("sh -c 'exit 0'"),
            "sh -c 'echo \"========= 4 passed in 0.02s =========\"'",
        ),
    );
    let cases = vec![EdgeCase {
        tier: EdgeTier::T1,
        scenario: "default read".to_string(),
        expected: "0.85".to_string(),
    }];

    let result = validator.validate(&fix(), &cases).await.unwrap();

    assert!(result.passed, "output: {}", result.output);
    assert_eq!(result.total, 4);
    assert!(result.failures.is_empty());
    assert_eq!(result.diff_lines, 1);
    assert_eq!(
        result.gate(Gate::Syntax).map(|g| g.outcome),
        Some(GateOutcome::Passed)
    );
}

#[tokio::test]
async fn test_pytest_failures_parsed() {
    let dir = tempfile::tempdir().unwrap();
    let script = "echo 'FAILED tests/test_config.py::test_default - AssertionError: 0.5 != 0.85'; \
                  echo '==== 1 failed, 2 passed in 0.10s ===='; exit 1";
    let validator = Validator::new(dir.path(), config(None, &format!("sh -c \"{script}\"")));

    let result = validator.validate(&fix(), &[]).await.unwrap();

    assert!(!result.passed);
    assert_eq!(result.total, 3);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].test_name, "test_default");
    assert!(result.failures[0].message.contains("0.5 != 0.85"));
    assert_eq!(
        result.gate(Gate::Syntax).map(|g| g.outcome),
        Some(GateOutcome::Skipped)
    );
}

#[tokio::test]
async fn test_silent_crash_becomes_unknown_failure() {
    let dir = tempfile::tempdir().unwrap();
    let validator = Validator::new(
        dir.path(),
        config(None, "sh -c 'echo collection blew up; exit 2'"),
    );

    let result = validator.validate(&fix(), &[]).await.unwrap();

    assert!(!result.passed);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].test_name, "unknown");
    assert!(result.failures[0].message.contains("collection blew up"));
}

#[tokio::test]
async fn test_missing_binary_is_spawn_error() {
    let dir = tempfile::tempdir().unwrap();
    let validator = Validator::new(
        dir.path(),
        config(None, "definitely-not-a-real-test-runner --all"),
    );

    let err = validator.validate(&fix(), &[]).await.unwrap_err();
    assert!(matches!(err, ValidatorError::Spawn { .. }));
}

#[tokio::test]
async fn test_timeout_reported_as_failure() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(None, "sleep 5");
    cfg.timeout_secs = 1;
    let validator = Validator::new(dir.path(), cfg);

    let result = validator.validate(&fix(), &[]).await.unwrap();
    assert!(!result.passed);
    assert_eq!(result.failures[0].test_name, "timeout");
}
