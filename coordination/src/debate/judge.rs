//! Judge verdicts: which agents changed their mind, and who persuaded them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::json_block::extract_json_block;

/// System prompt for the judge call.
pub const JUDGE_SYSTEM_PROMPT: &str = "You are a neutral judge reading a design debate. \
For each agent, decide from the final round whether they changed their position \
and, if so, which other agent persuaded them. \
Reply with JSON only, shaped like \
{\"<agent_id>\": {\"changed_mind\": true, \"influenced_by\": \"<agent_id>\"}}. \
Use null for influenced_by when the agent held their position.";

/// User message carrying the plain-text transcript.
pub fn judge_message(transcript: &str) -> String {
    format!("Debate transcript:\n\n{transcript}\n\nReturn the verdict JSON now.")
}

/// One agent's verdict.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    #[serde(default)]
    pub changed_mind: bool,
    #[serde(default)]
    pub influenced_by: Option<String>,
}

impl Verdict {
    /// Persuader id with any `@` prefix and case removed.
    pub fn persuader(&self) -> Option<String> {
        self.influenced_by
            .as_deref()
            .map(|p| p.trim().trim_start_matches('@').to_lowercase())
            .filter(|p| !p.is_empty())
    }
}

/// Parsed judge output. Malformed replies become `Ambiguous` and never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JudgeOutcome {
    Verdicts(BTreeMap<String, Verdict>),
    Ambiguous(String),
}

impl JudgeOutcome {
    pub fn parse(raw: &str) -> Self {
        let Some(block) = extract_json_block(raw) else {
            return Self::Ambiguous("no JSON object in judge reply".to_string());
        };
        match serde_json::from_str::<BTreeMap<String, Verdict>>(block) {
            Ok(verdicts) => Self::Verdicts(
                verdicts
                    .into_iter()
                    .map(|(agent, v)| (agent.trim_start_matches('@').to_lowercase(), v))
                    .collect(),
            ),
            Err(e) => Self::Ambiguous(format!("judge reply is not a verdict map: {e}")),
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Ambiguous(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fenced_verdicts() {
        let raw = "```json\n{\"architect\": {\"changed_mind\": true, \"influenced_by\": \"@Critic\"}, \
                   \"critic\": {\"changed_mind\": false, \"influenced_by\": null}}\n```";
        let JudgeOutcome::Verdicts(v) = JudgeOutcome::parse(raw) else {
            panic!("expected verdicts");
        };
        assert_eq!(v.len(), 2);
        assert!(v["architect"].changed_mind);
        assert_eq!(v["architect"].persuader().as_deref(), Some("critic"));
        assert_eq!(v["critic"].persuader(), None);
    }

    #[test]
    fn test_missing_fields_default() {
        let JudgeOutcome::Verdicts(v) = JudgeOutcome::parse("{\"pragmatist\": {}}") else {
            panic!("expected verdicts");
        };
        assert_eq!(v["pragmatist"], Verdict::default());
    }

    #[test]
    fn test_prose_is_ambiguous() {
        assert!(JudgeOutcome::parse("Everyone agreed, more or less.").is_ambiguous());
    }

    #[test]
    fn test_wrong_shape_is_ambiguous() {
        assert!(JudgeOutcome::parse("{\"architect\": \"yes\"}").is_ambiguous());
        assert!(JudgeOutcome::parse("{not json}").is_ambiguous());
    }

    #[test]
    fn test_empty_persuader_filtered() {
        let v = Verdict {
            changed_mind: true,
            influenced_by: Some("  ".to_string()),
        };
        assert_eq!(v.persuader(), None);
    }
}
