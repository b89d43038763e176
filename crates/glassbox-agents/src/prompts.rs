//! Prompt text for the classifier and the fix generator.
//!
//! Prompt versioning: bump `PROMPT_VERSION` whenever preamble content changes
//! so a logged reply can be traced back to the prompt that produced it.

use std::collections::BTreeMap;

use coordination::template::Template;
use coordination::triage::TriageResult;

/// Prompt version. Bump on any preamble content change.
pub const PROMPT_VERSION: &str = "1.2.0";

/// A fixed quality criterion or risk shown to every agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Criterion {
    pub id: &'static str,
    pub name: &'static str,
    pub desc: &'static str,
}

const fn criterion(id: &'static str, name: &'static str, desc: &'static str) -> Criterion {
    Criterion { id, name, desc }
}

/// Hard aspects: every fix must satisfy all of them.
pub const HARD_ASPECTS: [Criterion; 5] = [
    criterion("HA1", "Correctness", "Fix addresses the bug described in the issue"),
    criterion("HA2", "Minimal diff", "Only lines that fix the issue are changed"),
    criterion("HA3", "Backward compat", "All existing tests still pass"),
    criterion("HA4", "Syntax validity", "Changed file parses without errors"),
    criterion("HA5", "Import hygiene", "No broken or unused imports introduced"),
];

/// Hard challenges: failure modes seen on every kind of issue.
pub const HARD_CHALLENGES: [Criterion; 5] = [
    criterion("HC1", "String matching", "Copy existing text from the numbered source, never from memory"),
    criterion("HC2", "Unrelated test breakage", "The fix might break a test you did not know about"),
    criterion("HC3", "Over-engineering", "Fix only what the issue describes, no refactoring"),
    criterion("HC4", "Stale state", "The bug might already be fixed by a prior run"),
    criterion("HC5", "Embedded DSL", "Numbers and strings inside SQL, regex or prompts are data, not code"),
];

/// Soft aspects the classifier picks from per issue.
pub const SOFT_ASPECTS: [Criterion; 5] = [
    criterion("SA1", "Cross-boundary safety", "Values crossing module or process boundaries stay valid"),
    criterion("SA2", "Idempotency", "Running the fixed code twice gives the same result"),
    criterion("SA3", "Type correctness", "Types of changed values match their consumers"),
    criterion("SA4", "No hardcoding", "No new magic values where a constant exists"),
    criterion("SA5", "Readability", "The change reads like the surrounding code"),
];

pub const CLASSIFIER_PREAMBLE: &str = "\
You are the glassbox Manager. You classify bug reports and write the briefing \
a junior developer will follow. You never write code. \
Reply with exactly one JSON object and nothing else.";

pub const FIX_PREAMBLE: &str = "\
You are the glassbox Junior Dev. You fix exactly the bug you are given with the \
smallest possible line-range edit. \
Reply with exactly one JSON object and nothing else.";

/// `{i}: {line}` for every line, 1-indexed.
pub fn numbered(content: &str) -> String {
    content
        .split('\n')
        .enumerate()
        .map(|(i, line)| format!("{}: {line}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

fn numbered_sources(sources: &BTreeMap<String, String>) -> String {
    if sources.is_empty() {
        return "(no sources provided)".to_string();
    }
    sources
        .iter()
        .map(|(path, content)| format!("--- {path} ---\n{}", numbered(content)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn or_none(text: String) -> String {
    if text.is_empty() {
        "(none)".to_string()
    } else {
        text
    }
}

/// Issue identity shared by both prompts.
#[derive(Debug, Clone, Copy)]
pub struct IssueRef<'a> {
    pub number: u64,
    pub title: &'a str,
    pub body: &'a str,
}

pub fn classify_prompt(
    issue: IssueRef<'_>,
    sources: &BTreeMap<String, String>,
    template_ids: &[&str],
    past_reflections: &str,
) -> String {
    let soft = SOFT_ASPECTS
        .iter()
        .map(|a| format!("{} {}", a.id, a.name))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "\
Issue #{number}: {title}
{body}

Source file contents:
{sources}

Available templates: {templates}

INSTRUCTIONS:
1. Pick the best template_id from the list above.
2. Rate your confidence from 0.0 to 1.0.
3. If this is NOT a bug (feature request, question, duplicate), set skip_reason.
4. Pick relevant soft_aspects from: {soft}
5. Write 1-3 issue-specific soft_challenges (risks the developer should watch for).
6. Write 4-8 edge_cases. Every affected code path gets at least one of each tier: \
T1 happy path, T2 input variation, T3 error path, T4 boundary.

{past_reflections}

Return ONLY valid JSON:
{{
  \"template_id\": \"...\",
  \"confidence\": 0.95,
  \"skip_reason\": null,
  \"soft_aspects\": [{{\"id\": \"SA1\", \"name\": \"...\", \"reason\": \"...\"}}],
  \"soft_challenges\": [{{\"id\": \"SC1\", \"name\": \"...\", \"risk\": \"...\"}}],
  \"edge_cases\": [{{\"tier\": \"T1\", \"scenario\": \"...\", \"expected\": \"...\"}}]
}}",
        number = issue.number,
        title = issue.title,
        body = issue.body,
        sources = numbered_sources(sources),
        templates = template_ids.join(", "),
    )
}

pub fn fix_prompt(
    issue: IssueRef<'_>,
    template: &Template,
    triage: &TriageResult,
    sources: &BTreeMap<String, String>,
    feedback: Option<&str>,
) -> String {
    let aspects = or_none(
        triage
            .soft_aspects
            .iter()
            .map(|a| format!("- {}: {}", a.id, a.name))
            .collect::<Vec<_>>()
            .join("\n"),
    );
    let challenges = or_none(
        triage
            .soft_challenges
            .iter()
            .map(|c| format!("- {}: {} ({})", c.id, c.name, c.risk))
            .collect::<Vec<_>>()
            .join("\n"),
    );
    let edge_cases = or_none(
        triage
            .edge_cases
            .iter()
            .map(|e| format!("- {}: {} -> {}", e.tier, e.scenario, e.expected))
            .collect::<Vec<_>>()
            .join("\n"),
    );
    let hard = HARD_CHALLENGES
        .iter()
        .map(|c| format!("- {} {}: {}", c.id, c.name, c.desc))
        .collect::<Vec<_>>()
        .join("\n");
    let feedback = feedback
        .filter(|f| !f.trim().is_empty())
        .map(|f| format!("PREVIOUS ATTEMPT FEEDBACK:\n{f}\n"))
        .unwrap_or_default();

    format!(
        "\
Fix ONLY the bug described below.

Issue #{number}: {title}
{body}

Template: {template_id} ({template_name})
Template instructions:
{instructions}

Aspects to satisfy:
{aspects}

Challenges to watch for:
{challenges}
{hard}

Edge cases to handle:
{edge_cases}

Source files:
{sources}

{feedback}
Return ONLY valid JSON:
{{
  \"edits\": [
    {{\"file\": \"src/pkg/module.py\", \"start_line\": 12, \"end_line\": 12, \"new_text\": \"    value = 0.85\"}}
  ],
  \"test_code\": \"def test_fix():\\n    ...\",
  \"summary\": \"one-line commit message\",
  \"strategy\": \"brief approach description\"
}}

RULES:
- Change at most {max_files} file(s) and {max_diff_lines} line(s).
- \"file\" must be one of the paths shown above, exactly as written.
- Line numbers must match the numbered source shown above.
- Include a test that verifies the fix.",
        number = issue.number,
        title = issue.title,
        body = issue.body,
        template_id = template.id,
        template_name = template.name,
        instructions = template.coder_instructions.trim_end(),
        sources = numbered_sources(sources),
        max_files = template.max_files,
        max_diff_lines = template.max_diff_lines,
    )
}
