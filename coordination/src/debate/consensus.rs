//! Single-shot consensus: every agent answers once, highest trust wins.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One agent's answer with the trust it carried at the time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub agent: String,
    pub model: String,
    pub text: String,
    pub trust: f64,
}

/// A call that produced no answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentFailure {
    pub agent: String,
    pub error: String,
}

impl std::fmt::Display for AgentFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}: {}", self.agent, self.error)
    }
}

/// Highest-trust response. Ties go to the earliest response.
pub fn pick_consensus(responses: &[AgentResponse]) -> Option<&AgentResponse> {
    responses.iter().fold(None, |best: Option<&AgentResponse>, r| match best {
        Some(b) if b.trust >= r.trust => Some(b),
        _ => Some(r),
    })
}

/// Everything a consensus call produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusReport {
    pub task: String,
    pub responses: Vec<AgentResponse>,
    pub consensus_agent: String,
    pub consensus: String,
    pub trust_scores: BTreeMap<String, f64>,
    pub failures: Vec<AgentFailure>,
}

impl ConsensusReport {
    /// Build a report from the collected answers. `None` when nobody answered.
    pub fn from_responses(
        task: &str,
        responses: Vec<AgentResponse>,
        failures: Vec<AgentFailure>,
    ) -> Option<Self> {
        let winner = pick_consensus(&responses)?;
        let consensus_agent = winner.agent.clone();
        let consensus = winner.text.clone();
        let trust_scores = responses
            .iter()
            .map(|r| (r.agent.clone(), r.trust))
            .collect();
        Some(Self {
            task: task.to_string(),
            responses,
            consensus_agent,
            consensus,
            trust_scores,
            failures,
        })
    }

    /// Human-readable report: each answer, then the winner.
    pub fn render(&self) -> String {
        let mut out = format!("TASK: {}\n", self.task);
        for r in &self.responses {
            out.push_str(&format!(
                "\n@{} (trust:{:.2}):\n{}\n",
                r.agent, r.trust, r.text
            ));
        }
        for failure in &self.failures {
            out.push_str(&format!("\n[failed] {failure}\n"));
        }
        out.push_str(&format!(
            "\nCONSENSUS (@{}, trust:{:.2}):\n{}\n",
            self.consensus_agent,
            self.trust_scores
                .get(&self.consensus_agent)
                .copied()
                .unwrap_or_default(),
            self.consensus
        ));
        out
    }
}
