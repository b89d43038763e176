//! Manager: classifies an issue and writes the briefing.
//!
//! The classifier never writes code. It picks a template, rates its
//! confidence, may decide the issue is not a bug (`skip_reason`), and
//! produces the soft aspects, soft challenges and tiered edge cases the fix
//! generator and the tester work from.

use std::collections::BTreeMap;
use std::sync::Arc;

use coordination::memory::ReflectionMemory;
use coordination::template::{Template, TemplateLoader};
use coordination::triage::{EdgeTier, TriageResult};
use tracing::{info, warn};

use super::AgentError;
use crate::contracts::parse_triage;
use crate::llm::{CompletionRequest, CompletionService};
use crate::prompts::{self, IssueRef, HARD_ASPECTS, HARD_CHALLENGES};

pub struct Classifier {
    llm: Arc<dyn CompletionService>,
    model: String,
    temperature: f32,
}

impl Classifier {
    pub fn new(llm: Arc<dyn CompletionService>, model: &str, temperature: f32) -> Self {
        Self {
            llm,
            model: model.to_string(),
            temperature,
        }
    }

    /// One JSON-mode call, parsed strictly into a [`TriageResult`].
    ///
    /// Past reflections matching the issue title are included in the prompt.
    pub async fn classify(
        &self,
        issue: IssueRef<'_>,
        sources: &BTreeMap<String, String>,
        templates: &TemplateLoader,
        memory: &ReflectionMemory,
    ) -> Result<TriageResult, AgentError> {
        let past = memory.format_for_prompt(issue.title);
        let user = prompts::classify_prompt(issue, sources, &templates.ids(), &past);
        let request = CompletionRequest::new(&self.model, prompts::CLASSIFIER_PREAMBLE, &user)
            .temperature(self.temperature)
            .json();

        let raw = self.llm.complete(&request).await?;
        let triage = parse_triage(&raw)?;

        let missing = EdgeTier::missing(&triage.edge_cases);
        if !missing.is_empty() {
            warn!(issue = issue.number, missing = ?missing, "Briefing leaves edge-case tiers uncovered");
        }
        info!(
            issue = issue.number,
            template = %triage.template_id,
            confidence = triage.confidence,
            skip = triage.skip().unwrap_or(""),
            edge_cases = triage.edge_cases.len(),
            "Issue classified"
        );
        Ok(triage)
    }
}

/// Markdown briefing posted on the issue.
///
/// A skipped issue gets only the summary table with a skip row.
pub fn format_briefing(triage: &TriageResult, template: &Template) -> String {
    let mut lines = vec![
        "| | |".to_string(),
        "|---|---|".to_string(),
        format!("| **Template** | `{}` ({}) |", template.id, template.name),
        format!("| **Confidence** | {:.0}% |", triage.confidence * 100.0),
    ];
    if let Some(reason) = triage.skip() {
        lines.push(format!("| **Skip** | {reason} |"));
        return lines.join("\n");
    }

    lines.push(String::new());
    lines.push("**Aspects:**".into());
    let hard: Vec<String> = HARD_ASPECTS
        .iter()
        .map(|a| format!("{} {}", a.id, a.name))
        .collect();
    lines.push(format!("- Hard: {}", hard.join(" · ")));
    if !triage.soft_aspects.is_empty() {
        let soft: Vec<String> = triage
            .soft_aspects
            .iter()
            .map(|a| format!("{} {}", a.id, a.name))
            .collect();
        lines.push(format!("- Soft: {}", soft.join(" · ")));
    }

    lines.push(String::new());
    lines.push("**Challenges:**".into());
    let hard: Vec<String> = HARD_CHALLENGES
        .iter()
        .map(|c| format!("{} {}", c.id, c.name))
        .collect();
    lines.push(format!(
        "<details><summary>Hard challenges ({})</summary>\n\n- {}\n</details>",
        HARD_CHALLENGES.len(),
        hard.join(" · ")
    ));
    for c in &triage.soft_challenges {
        lines.push(format!("- {}: {}", c.name, c.risk));
    }

    if !triage.edge_cases.is_empty() {
        lines.push(String::new());
        lines.push("**Edge cases:**".into());
        for ec in &triage.edge_cases {
            lines.push(format!(
                "- {} ({}): `{}` -> {}",
                ec.tier,
                ec.tier.describe(),
                ec.scenario,
                ec.expected
            ));
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "**Junior Dev**, your mission. Template: `{}`. Go.",
        template.id
    ));
    lines.join("\n")
}
