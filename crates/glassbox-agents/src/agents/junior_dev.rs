//! Junior Dev: turns a briefing into a concrete line-edit fix.

use std::collections::BTreeMap;
use std::sync::Arc;

use coordination::mutator::Fix;
use coordination::template::Template;
use coordination::triage::TriageResult;
use tracing::info;

use super::AgentError;
use crate::contracts::parse_fix;
use crate::llm::{CompletionRequest, CompletionService};
use crate::prompts::{self, IssueRef};

pub struct FixGenerator {
    llm: Arc<dyn CompletionService>,
    model: String,
    temperature: f32,
}

impl FixGenerator {
    pub fn new(llm: Arc<dyn CompletionService>, model: &str, temperature: f32) -> Self {
        Self {
            llm,
            model: model.to_string(),
            temperature,
        }
    }

    /// Ask for a fix against `sources`. `feedback` is the previous attempt's
    /// failure, passed to the model verbatim.
    ///
    /// Every edit in the returned fix names a key of `sources`.
    pub async fn generate(
        &self,
        issue: IssueRef<'_>,
        template: &Template,
        triage: &TriageResult,
        sources: &BTreeMap<String, String>,
        feedback: Option<&str>,
    ) -> Result<Fix, AgentError> {
        let user = prompts::fix_prompt(issue, template, triage, sources, feedback);
        let request = CompletionRequest::new(&self.model, prompts::FIX_PREAMBLE, &user)
            .temperature(self.temperature)
            .json();

        let raw = self.llm.complete(&request).await?;
        let fix = parse_fix(&raw, sources)?;
        info!(
            issue = issue.number,
            edits = fix.edits.len(),
            diff_lines = fix.diff_lines(),
            retry = feedback.is_some(),
            "Fix generated"
        );
        Ok(fix)
    }
}

/// Markdown comment describing a fix before it is tested.
pub fn format_fix_comment(fix: &Fix) -> String {
    let mut lines = vec!["**Junior Dev**: generated fix\n".to_string()];
    for edit in &fix.edits {
        lines.push(format!(
            "**{}** line {}-{}:",
            edit.file, edit.start_line, edit.end_line
        ));
        let mut body = edit.new_text.clone();
        if !body.ends_with('\n') {
            body.push('\n');
        }
        lines.push(format!("```\n{body}```"));
    }
    if !fix.strategy.is_empty() {
        lines.push(format!("\n**Strategy:** {}", fix.strategy));
    }
    lines.push(format!("**Lines changed:** {}", fix.diff_lines()));
    lines.push("\n**Tester**, over to you.".into());
    lines.join("\n")
}
