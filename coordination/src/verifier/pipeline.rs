//! Validator: syntax gate, test gate, diff-size gate.
//!
//! Gates run strictly in order. A failing syntax gate short-circuits: the
//! test command is never spawned and the result carries the import
//! diagnostic instead of a test count.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::parser::{parse_output, tail};
use super::report::{Gate, GateOutcome, GateResult, TestFailure, TestResult};
use crate::mutator::Fix;
use crate::triage::{EdgeCase, EdgeTier};

/// Configuration for the validator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Import/parse check with a `{module}` placeholder. `None` disables the gate.
    pub syntax_command: Option<String>,
    /// Modules to check. Empty means derive them from the fix's files.
    #[serde(default)]
    pub modules: Vec<String>,
    /// Full test command, split shell-style into argv.
    pub test_command: String,
    /// Per-command timeout in seconds.
    pub timeout_secs: u64,
    /// Output lines kept for synthetic failures and syntax diagnostics.
    pub tail_lines: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            syntax_command: Some("python -c \"import {module}\"".to_string()),
            modules: Vec::new(),
            test_command: "python -m pytest tests/ -v --tb=short".to_string(),
            timeout_secs: 300,
            tail_lines: 15,
        }
    }
}

#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("Command is empty or has unbalanced quotes: {0}")]
    BadCommand(String),

    #[error("Failed to execute {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Why a command did not produce an exit status.
enum RunFailure {
    Spawn(std::io::Error),
    TimedOut,
}

/// A command that ran to completion or hit the timeout.
enum RunOutcome {
    Finished(std::process::Output),
    TimedOut,
}

/// Runs the validation gates for a fix inside a working tree.
pub struct Validator {
    working_dir: PathBuf,
    config: ValidatorConfig,
}

impl Validator {
    pub fn new(working_dir: impl AsRef<Path>, config: ValidatorConfig) -> Self {
        Self {
            working_dir: working_dir.as_ref().to_path_buf(),
            config,
        }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate `fix`: syntax gate, then tests, then diff size.
    pub async fn validate(
        &self,
        fix: &Fix,
        edge_cases: &[EdgeCase],
    ) -> Result<TestResult, ValidatorError> {
        let missing = EdgeTier::missing(edge_cases);
        if !edge_cases.is_empty() && !missing.is_empty() {
            tracing::debug!(
                cases = edge_cases.len(),
                missing = ?missing,
                "Edge cases do not cover every tier"
            );
        }

        let diff_lines = fix.diff_lines();
        let mut gates = Vec::with_capacity(3);

        if let Some(diagnostic) = self.run_syntax_gate(fix, &mut gates).await? {
            gates.push(skipped(Gate::Tests));
            gates.push(skipped(Gate::DiffSize));
            tracing::info!(diagnostic = %diagnostic, "Syntax gate failed, tests skipped");
            return Ok(TestResult {
                passed: false,
                total: 0,
                failures: vec![TestFailure::new("TP1_syntax", &diagnostic)],
                output: format!("TP1 Syntax FAILED:\n{diagnostic}"),
                diff_lines,
                syntax_error: Some(diagnostic),
                gates,
            });
        }

        let mut result = self.run_test_gate(&mut gates).await?;
        result.diff_lines = diff_lines;
        gates.push(GateResult {
            gate: Gate::DiffSize,
            // The budget lives on the template; callers compare with diff_within_budget.
            outcome: GateOutcome::Passed,
            duration_ms: 0,
            exit_code: None,
        });
        result.gates = gates;

        tracing::info!(
            passed = result.passed,
            total = result.total,
            failures = result.failures.len(),
            diff_lines,
            "Validation complete"
        );
        Ok(result)
    }

    /// Returns the diagnostic of the first failing module, if any.
    async fn run_syntax_gate(
        &self,
        fix: &Fix,
        gates: &mut Vec<GateResult>,
    ) -> Result<Option<String>, ValidatorError> {
        let Some(template) = &self.config.syntax_command else {
            gates.push(skipped(Gate::Syntax));
            return Ok(None);
        };

        let modules = if self.config.modules.is_empty() {
            modules_for_fix(fix)
        } else {
            self.config.modules.clone()
        };

        let start = Instant::now();
        let mut last_exit = Some(0);
        for module in &modules {
            let command = template.replace("{module}", module);
            let output = match self.run(&command).await? {
                RunOutcome::Finished(output) => output,
                RunOutcome::TimedOut => {
                    gates.push(gate(Gate::Syntax, GateOutcome::Failed, start, None));
                    return Ok(Some(format!(
                        "{command} timed out after {}s",
                        self.config.timeout_secs
                    )));
                }
            };
            last_exit = output.status.code();
            if !output.status.success() {
                gates.push(gate(Gate::Syntax, GateOutcome::Failed, start, last_exit));
                let stderr = String::from_utf8_lossy(&output.stderr);
                let stdout = String::from_utf8_lossy(&output.stdout);
                let text = if stderr.trim().is_empty() { stdout } else { stderr };
                return Ok(Some(tail(text.trim(), self.config.tail_lines)));
            }
            tracing::debug!(module = %module, "Syntax check passed");
        }

        gates.push(gate(Gate::Syntax, GateOutcome::Passed, start, last_exit));
        Ok(None)
    }

    async fn run_test_gate(&self, gates: &mut Vec<GateResult>) -> Result<TestResult, ValidatorError> {
        let start = Instant::now();
        let output = match self.run(&self.config.test_command).await? {
            RunOutcome::Finished(output) => output,
            RunOutcome::TimedOut => {
                gates.push(gate(Gate::Tests, GateOutcome::Failed, start, None));
                let message = format!("Test run timed out after {}s", self.config.timeout_secs);
                return Ok(TestResult::failed("timeout", &message, message.clone()));
            }
        };

        let combined = format!(
            "{}\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        let parsed = parse_output(&combined);
        let exit_ok = output.status.success();

        let mut failures = parsed.failures.clone();
        let passed = exit_ok && parsed.failed == 0 && failures.is_empty();
        if !passed && failures.is_empty() {
            failures.push(TestFailure::new(
                "unknown",
                &tail(&combined, self.config.tail_lines),
            ));
        }

        let outcome = if passed {
            GateOutcome::Passed
        } else {
            GateOutcome::Failed
        };
        gates.push(gate(Gate::Tests, outcome, start, output.status.code()));

        Ok(TestResult {
            passed,
            total: parsed.total(),
            failures,
            output: combined,
            diff_lines: 0,
            syntax_error: None,
            gates: Vec::new(),
        })
    }

    /// Run `command` in the working directory.
    async fn run(&self, command: &str) -> Result<RunOutcome, ValidatorError> {
        let argv = shlex::split(command)
            .filter(|argv| !argv.is_empty())
            .ok_or_else(|| ValidatorError::BadCommand(command.to_string()))?;

        let mut cmd = tokio::process::Command::new(&argv[0]);
        cmd.args(&argv[1..]);
        match self.run_with_timeout(&mut cmd).await {
            Ok(output) => Ok(RunOutcome::Finished(output)),
            Err(RunFailure::TimedOut) => {
                tracing::warn!(command, timeout_secs = self.config.timeout_secs, "Command timed out");
                Ok(RunOutcome::TimedOut)
            }
            Err(RunFailure::Spawn(source)) => Err(ValidatorError::Spawn {
                command: command.to_string(),
                source,
            }),
        }
    }

    async fn run_with_timeout(
        &self,
        cmd: &mut tokio::process::Command,
    ) -> Result<std::process::Output, RunFailure> {
        cmd.current_dir(&self.working_dir).kill_on_drop(true);

        // Own process group so a timeout kills runner-spawned children too.
        #[cfg(unix)]
        cmd.process_group(0);

        let timeout_dur = Duration::from_secs(self.config.timeout_secs);
        match tokio::time::timeout(timeout_dur, cmd.output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(RunFailure::Spawn(e)),
            Err(_) => Err(RunFailure::TimedOut),
        }
    }
}

fn gate(gate: Gate, outcome: GateOutcome, start: Instant, exit_code: Option<i32>) -> GateResult {
    GateResult {
        gate,
        outcome,
        duration_ms: start.elapsed().as_millis() as u64,
        exit_code,
    }
}

fn skipped(gate: Gate) -> GateResult {
    GateResult {
        gate,
        outcome: GateOutcome::Skipped,
        duration_ms: 0,
        exit_code: None,
    }
}

/// Importable module name for a source path.
///
/// `src/pkg/mod.py` becomes `pkg.mod`; `pkg/__init__.py` becomes `pkg`.
/// Returns `None` for names that are not plain dotted identifiers.
pub fn module_for_path(path: &str) -> Option<String> {
    let path = path.strip_prefix("./").unwrap_or(path);
    let path = path.strip_prefix("src/").unwrap_or(path);
    let stem = match path.rfind('.') {
        Some(dot) if !path[dot..].contains('/') => &path[..dot],
        _ => path,
    };
    let dotted = stem.replace('/', ".");
    let dotted = dotted.strip_suffix(".__init__").unwrap_or(&dotted).to_string();

    let valid = !dotted.is_empty()
        && dotted
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_alphanumeric() || c == '_'));
    valid.then_some(dotted)
}

/// Distinct modules touched by a fix, in edit order.
pub fn modules_for_fix(fix: &Fix) -> Vec<String> {
    let mut modules: Vec<String> = Vec::new();
    for file in fix.files() {
        if let Some(module) = module_for_path(file) {
            if !modules.contains(&module) {
                modules.push(module);
            }
        }
    }
    modules
}
