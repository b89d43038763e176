//! Retry pipeline: classify, then generate, apply and validate until green
//! or out of attempts.
//!
//! ```text
//! CLASSIFY ─┬─> SKIP
//!           └─> GENERATE -> APPLY -> SYNTAX_CHECK -> TEST -> DONE
//!                  ^          │           │           │
//!                  └──────────┴───────────┴───────────┘   (reset tree, feedback)
//!                                    after the last retry -> FAILED
//! ```
//!
//! The template's `max_attempts` counts retries, so GENERATE runs at most
//! `max_attempts + 1` times. Every retry resets the working tree first, so
//! each attempt sees the pristine sources plus the previous attempt's
//! feedback and nothing else.

use std::collections::BTreeMap;
use std::sync::Arc;

use coordination::feedback::{AttemptFailure, FeedbackCompiler};
use coordination::memory::{MemoryError, Reflection, ReflectionMemory};
use coordination::mutator::{CodeMutator, Fix};
use coordination::shell_safety::branch_for_issue;
use coordination::template::{Template, TemplateLoader};
use coordination::triage::TriageResult;
use coordination::verifier::{TestResult, Validator};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::agents::{format_briefing, format_fix_comment, format_report, Classifier, FixGenerator};
use crate::config::Settings;
use crate::llm::CompletionService;
use crate::prompts::{IssueRef, PROMPT_VERSION};
use crate::state_machine::{IllegalTransition, PipelineState, StateMachine, TransitionRecord};
use crate::tracker::IssueHost;
use crate::workspace::WorkingTree;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("issue host: {0:#}")]
    Host(anyhow::Error),

    #[error("working tree: {0:#}")]
    Workspace(anyhow::Error),

    #[error("reflection memory: {0}")]
    Memory(#[from] MemoryError),

    #[error("no fix templates loaded")]
    NoTemplates,

    #[error(transparent)]
    State(#[from] IllegalTransition),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Done { pr_url: String },
    Skipped { reason: String },
    Failed { reason: String },
}

/// How one run ended, with the full transition log.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub issue: u64,
    pub status: RunStatus,
    /// GENERATE calls made.
    pub attempts: u32,
    pub transitions: Vec<TransitionRecord>,
}

impl RunOutcome {
    fn new(issue: u64, status: RunStatus, attempts: u32, sm: StateMachine) -> Self {
        info!(issue, summary = %sm.summary(), "Run finished");
        Self {
            issue,
            status,
            attempts,
            transitions: sm.into_transitions(),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self.status, RunStatus::Done { .. })
    }

    /// Target state of every transition, in order.
    pub fn states(&self) -> Vec<PipelineState> {
        self.transitions.iter().map(|t| t.to).collect()
    }
}

/// Result of one GENERATE..TEST pass.
enum Attempt {
    Passed { fix: Fix, result: TestResult },
    Failed {
        failure: AttemptFailure,
        result: Option<TestResult>,
    },
}

pub struct RetryPipeline {
    settings: Settings,
    host: Arc<dyn IssueHost>,
    tree: Arc<dyn WorkingTree>,
    classifier: Classifier,
    generator: FixGenerator,
    mutator: CodeMutator,
    validator: Validator,
    templates: TemplateLoader,
    memory: ReflectionMemory,
    feedback: FeedbackCompiler,
}

impl RetryPipeline {
    pub fn new(
        settings: Settings,
        llm: Arc<dyn CompletionService>,
        host: Arc<dyn IssueHost>,
        tree: Arc<dyn WorkingTree>,
        templates: TemplateLoader,
        memory: ReflectionMemory,
    ) -> Self {
        let classifier = Classifier::new(llm.clone(), &settings.model, settings.temperature_classify);
        let generator = FixGenerator::new(llm, &settings.model, settings.temperature_code);
        let mutator = CodeMutator::new(tree.root());
        let validator = Validator::new(tree.root(), settings.validator_config());
        let feedback = FeedbackCompiler::new(settings.max_feedback_failures);
        Self {
            settings,
            host,
            tree,
            classifier,
            generator,
            mutator,
            validator,
            templates,
            memory,
            feedback,
        }
    }

    pub fn memory(&self) -> &ReflectionMemory {
        &self.memory
    }

    /// Run the whole pipeline for one issue.
    ///
    /// Classification failure, a skip and an exhausted budget are outcomes,
    /// not errors. Errors are reserved for the host, the working tree and
    /// reflection persistence. Once the issue is read, every error is
    /// preceded by a saved reflection naming the failing stage.
    pub async fn run(&mut self, issue_number: u64) -> Result<RunOutcome, PipelineError> {
        let mut sm = StateMachine::new();
        let issue = self
            .host
            .read_issue(issue_number)
            .map_err(PipelineError::Host)?;
        info!(issue = issue_number, title = %issue.title, "Issue loaded");
        let issue_ref = IssueRef {
            number: issue_number,
            title: &issue.title,
            body: &issue.body,
        };

        let sources = match self.tree.read_sources() {
            Ok(sources) => sources,
            Err(e) => {
                let err = PipelineError::Workspace(e);
                return Err(self.abort(issue_number, &issue.title, None, "read_sources", err));
            }
        };
        let ack = self.settings.ack_comment_id;

        // CLASSIFY
        let triage = match self
            .classifier
            .classify(issue_ref, &sources, &self.templates, &self.memory)
            .await
        {
            Ok(triage) => triage,
            Err(e) => {
                let reason = format!("classification failed: {e}");
                error!(issue = issue_number, error = %e, "Classification failed");
                self.silent(issue_number, ack, &format!("**Manager**\n\nAgent crashed: {reason}"));
                self.memory.save(
                    Reflection::new(issue_number, &issue.title, &reason)
                        .with_failure_modes(vec!["classification".to_string()]),
                )?;
                sm.fail(&reason)?;
                return Ok(RunOutcome::new(issue_number, RunStatus::Failed { reason }, 0, sm));
            }
        };

        let issue_text = format!("{}\n{}", issue.title, issue.body);
        let template = self
            .templates
            .resolve(&triage.template_id, &issue_text)
            .cloned()
            .ok_or(PipelineError::NoTemplates)?;

        if let Some(reason) = triage.skip() {
            let body = format!(
                "**Manager**\n\nSkipping: {reason}\n\n{}",
                format_briefing(&triage, &template)
            );
            self.silent(issue_number, ack, &body);
            sm.advance(PipelineState::Skip, Some(reason))?;
            let status = RunStatus::Skipped {
                reason: reason.to_string(),
            };
            return Ok(RunOutcome::new(issue_number, status, 0, sm));
        }

        let body = format!(
            "**Manager**\n\nPicked up **#{issue_number}**: \"{}\"\n\n{}",
            issue.title,
            format_briefing(&triage, &template)
        );
        let briefing_id = self.silent(issue_number, ack, &body);
        if let Err(e) = self.host.add_reaction(briefing_id, "+1") {
            warn!(comment = briefing_id, error = %e, "Reaction failed");
        }

        let branch = branch_for_issue(issue_number);
        if let Err(e) = self.host.create_branch(&branch) {
            let err = PipelineError::Host(e);
            return Err(self.abort(issue_number, &issue.title, Some(&template.id), "branch", err));
        }

        // Attempt loop
        let budget = template.max_attempts.unwrap_or(self.settings.max_retries) + 1;
        let mut feedback: Option<String> = None;
        let mut stages: Vec<String> = Vec::new();
        let mut last_result: Option<TestResult> = None;

        for attempt in 1..=budget {
            sm.set_attempt(attempt);
            // Read after the branch checkout and after every reset.
            let prepared = if attempt > 1 {
                self.tree
                    .reset_to_baseline()
                    .and_then(|()| self.tree.read_sources())
            } else {
                self.tree.read_sources()
            };
            let sources = match prepared {
                Ok(sources) => sources,
                Err(e) => {
                    let err = PipelineError::Workspace(e);
                    let stage = if attempt > 1 { "reset" } else { "read_sources" };
                    return Err(self.abort(issue_number, &issue.title, Some(&template.id), stage, err));
                }
            };
            sm.advance(
                PipelineState::Generate,
                Some(&format!("attempt {attempt}/{budget}")),
            )?;

            match self
                .attempt(&mut sm, issue_ref, &template, &triage, &sources, feedback.as_deref())
                .await?
            {
                Attempt::Passed { fix, result } => {
                    let pr_url = match self.publish(
                        issue_number,
                        &branch,
                        &template,
                        &triage,
                        &fix,
                        &result,
                        attempt,
                    ) {
                        Ok(pr_url) => pr_url,
                        Err(err) => {
                            return Err(self.abort(
                                issue_number,
                                &issue.title,
                                Some(&template.id),
                                "publish",
                                err,
                            ))
                        }
                    };
                    sm.advance(PipelineState::Done, Some(&pr_url))?;
                    return Ok(RunOutcome::new(
                        issue_number,
                        RunStatus::Done { pr_url },
                        attempt,
                        sm,
                    ));
                }
                Attempt::Failed { failure, result } => {
                    let text = self.feedback.compile(&failure);
                    warn!(
                        issue = issue_number,
                        attempt,
                        stage = failure.stage(),
                        "Attempt failed"
                    );
                    stages.push(failure.stage().to_string());
                    if result.is_some() {
                        last_result = result;
                    }
                    feedback = Some(text);
                }
            }
        }

        // Exhausted
        if let Some(result) = &last_result {
            let report = format_report(result, &triage.edge_cases, template.max_diff_lines);
            self.post(issue_number, &format!("**Tester**\n\n{report}"));
        }
        self.post(
            issue_number,
            &format!("**Manager**\n\nFix failed after {budget} attempts. Manual fix needed."),
        );

        let last_feedback = feedback.unwrap_or_default();
        self.memory.save(
            Reflection::new(issue_number, &issue.title, &last_feedback)
                .with_template(&template.id)
                .with_failure_modes(stages),
        )?;

        let reason = format!("retry budget exhausted after {budget} attempts");
        sm.fail(&reason)?;
        Ok(RunOutcome::new(
            issue_number,
            RunStatus::Failed { reason },
            budget,
            sm,
        ))
    }

    /// GENERATE, APPLY, SYNTAX_CHECK, TEST for one attempt.
    async fn attempt(
        &self,
        sm: &mut StateMachine,
        issue: IssueRef<'_>,
        template: &Template,
        triage: &TriageResult,
        sources: &BTreeMap<String, String>,
        feedback: Option<&str>,
    ) -> Result<Attempt, PipelineError> {
        let fix = match self
            .generator
            .generate(issue, template, triage, sources, feedback)
            .await
        {
            Ok(fix) => fix,
            Err(e) => {
                return Ok(Attempt::Failed {
                    failure: AttemptFailure::Generation(e.to_string()),
                    result: None,
                })
            }
        };

        sm.advance(PipelineState::Apply, Some(&fix.summary))?;
        if let Err(e) = self.mutator.apply_all(&fix.edits) {
            return Ok(Attempt::Failed {
                failure: AttemptFailure::Apply(e.to_string()),
                result: None,
            });
        }
        if !fix.test_code.trim().is_empty() {
            let test_file = format!("tests/test_issue_{}.py", issue.number);
            if let Err(e) = self.mutator.write_test_file(&test_file, &fix.test_code) {
                return Ok(Attempt::Failed {
                    failure: AttemptFailure::Apply(e.to_string()),
                    result: None,
                });
            }
        }

        sm.advance(PipelineState::SyntaxCheck, None)?;
        let result = match self.validator.validate(&fix, &triage.edge_cases).await {
            Ok(result) => result,
            Err(e) => {
                return Ok(Attempt::Failed {
                    failure: AttemptFailure::Validation(e.to_string()),
                    result: None,
                })
            }
        };
        if result.syntax_error.is_some() {
            return Ok(Attempt::Failed {
                failure: AttemptFailure::from_result(&result),
                result: Some(result),
            });
        }

        sm.advance(PipelineState::Test, None)?;
        if !result.passed {
            return Ok(Attempt::Failed {
                failure: AttemptFailure::from_result(&result),
                result: Some(result),
            });
        }
        if !result.diff_within_budget(template.max_diff_lines) {
            warn!(
                diff_lines = result.diff_lines,
                max = template.max_diff_lines,
                "Fix exceeds the template's diff budget"
            );
        }
        Ok(Attempt::Passed { fix, result })
    }

    /// Comments, commit, pull request and approval. Returns the PR URL.
    #[allow(clippy::too_many_arguments)]
    fn publish(
        &self,
        issue: u64,
        branch: &str,
        template: &Template,
        triage: &TriageResult,
        fix: &Fix,
        result: &TestResult,
        attempts: u32,
    ) -> Result<String, PipelineError> {
        self.post(issue, &format_fix_comment(fix));
        let report = format_report(result, &triage.edge_cases, template.max_diff_lines);
        self.post(issue, &format!("**Tester**\n\n{report}"));

        let title = format!("fix: {} (#{issue})", fix.summary);
        self.host
            .commit_and_push(branch, &title)
            .map_err(PipelineError::Host)?;
        let pr_url = self
            .host
            .create_pull_request(branch, issue, &title, &pr_body(issue, template, fix))
            .map_err(PipelineError::Host)?;

        self.post(
            issue,
            &format!(
                "**Manager**\n\nApproved. All aspects pass, all edge cases clear.\n\n\
                 | | |\n|---|---|\n\
                 | **PR** | {pr_url} |\n\
                 | **Branch** | `{branch}` |\n\
                 | **Template** | `{}` |\n\
                 | **Attempts** | {attempts} |",
                template.id
            ),
        );
        info!(issue, pr = %pr_url, attempts, "Fix published");
        Ok(pr_url)
    }

    /// Record a reflection for a run that ends in `err`, then hand `err` back.
    ///
    /// A failed save is logged; the original error wins.
    fn abort(
        &mut self,
        issue: u64,
        title: &str,
        template_id: Option<&str>,
        stage: &str,
        err: PipelineError,
    ) -> PipelineError {
        error!(issue, stage, error = %err, "Run aborted");
        let mut reflection = Reflection::new(issue, title, &format!("{stage} failed: {err}"))
            .with_failure_modes(vec![stage.to_string()]);
        if let Some(id) = template_id {
            reflection = reflection.with_template(id);
        }
        if let Err(save_err) = self.memory.save(reflection) {
            warn!(issue, error = %save_err, "Could not save reflection for aborted run");
        }
        err
    }

    /// Post a status comment. A failure is logged, not fatal.
    fn post(&self, issue: u64, body: &str) -> u64 {
        self.host.post_comment(issue, body).unwrap_or_else(|e| {
            warn!(issue, error = %e, "Comment failed");
            0
        })
    }

    /// Revise the ack comment if there is one. A failure is logged, not fatal.
    fn silent(&self, issue: u64, comment_id: u64, body: &str) -> u64 {
        self.host
            .silent_update(issue, comment_id, body)
            .unwrap_or_else(|e| {
                warn!(issue, comment = comment_id, error = %e, "Status update failed");
                0
            })
    }
}

fn pr_body(issue: u64, template: &Template, fix: &Fix) -> String {
    let changes: Vec<String> = fix
        .edits
        .iter()
        .map(|e| format!("- `{}` lines {}-{}", e.file, e.start_line, e.end_line))
        .collect();
    format!(
        "Closes #{issue}\n\n## Changes\n{}\n{}\n\n## Strategy\n{}\n\n## Template\n`{}` ({})\n\n\
         <sub>prompts v{PROMPT_VERSION}</sub>\n",
        fix.summary,
        changes.join("\n"),
        fix.strategy,
        template.id,
        template.name
    )
}
