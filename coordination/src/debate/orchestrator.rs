//! Debate orchestrator: consensus fan-out and the three-round debate.
//!
//! The orchestrator never talks to a model directly. Every call goes through
//! an [`AgentBackend`], and every trust change goes through the injected
//! [`TrustStore`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::consensus::{AgentFailure, AgentResponse, ConsensusReport};
use super::judge::{judge_message, JudgeOutcome, JUDGE_SYSTEM_PROMPT};
use super::personas::{Persona, Roster};
use super::state::{turn_message, Round, Transcript};
use crate::trust::{TrustError, TrustStore};

/// System prompt for the post-debate summary call.
pub const SUMMARY_SYSTEM_PROMPT: &str = "You summarise design debates. \
Given the transcript, write the converged action plan as a short numbered list. \
Note any point still disputed.";

// ============================================================================
// Backend seam
// ============================================================================

/// Failure of a single agent call.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("empty response")]
    Empty,
}

/// The `ask` capability: one persona, one system prompt, one user message.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    async fn ask(&self, persona: &Persona, system: &str, user: &str)
        -> Result<String, BackendError>;
}

// ============================================================================
// Errors and reports
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DebateError {
    #[error("no known agents selected")]
    NoAgents,

    #[error("all {} agents failed", .0.len())]
    AllAgentsFailed(Vec<AgentFailure>),

    #[error("trust store error: {0}")]
    Trust(#[from] TrustError),
}

/// One persuasion credited to an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustChange {
    pub persuader: String,
    pub persuaded: String,
    pub before: f64,
    pub after: f64,
}

/// How the judge step ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum DebateOutcome {
    Judged,
    Ambiguous(String),
}

/// Everything a debate produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateReport {
    pub id: Uuid,
    pub topic: String,
    pub started_at: DateTime<Utc>,
    pub agents: Vec<String>,
    pub transcript: Transcript,
    pub summary: Option<String>,
    pub outcome: DebateOutcome,
    pub trust_changes: Vec<TrustChange>,
    pub held: Vec<String>,
    pub failures: Vec<AgentFailure>,
}

impl DebateReport {
    pub fn render(&self) -> String {
        let mut out = format!("DEBATE {}\nTOPIC: {}\n", self.id, self.topic);

        for round in Round::ALL {
            out.push_str(&format!("\n== Round {} ({round}) ==\n", round.index() + 1));
            for turn in self.transcript.round(round) {
                out.push_str(&format!("\n@{}:\n{}\n", turn.agent_id, turn.text));
            }
        }

        if let Some(summary) = &self.summary {
            out.push_str(&format!("\n== Convergence ==\n{summary}\n"));
        }

        out.push_str("\n== Trust ==\n");
        match &self.outcome {
            DebateOutcome::Ambiguous(reason) => {
                out.push_str(&format!("ambiguous judge verdict, no trust changes ({reason})\n"));
            }
            DebateOutcome::Judged if self.trust_changes.is_empty() => {
                out.push_str("no agent changed position\n");
            }
            DebateOutcome::Judged => {
                for change in &self.trust_changes {
                    out.push_str(&format!(
                        "@{} {:.3} -> {:.3} (persuaded @{})\n",
                        change.persuader, change.before, change.after, change.persuaded
                    ));
                }
            }
        }
        for agent in &self.held {
            out.push_str(&format!("@{agent} held position\n"));
        }
        for failure in &self.failures {
            out.push_str(&format!("[failed] {failure}\n"));
        }
        out
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebateConfig {
    /// Ask the first agent for a converged plan after the last round.
    pub summarize: bool,
}

impl Default for DebateConfig {
    fn default() -> Self {
        Self { summarize: true }
    }
}

pub struct DebateOrchestrator {
    trust: Arc<dyn TrustStore>,
    backend: Arc<dyn AgentBackend>,
    roster: Roster,
    config: DebateConfig,
}

impl DebateOrchestrator {
    pub fn new(trust: Arc<dyn TrustStore>, backend: Arc<dyn AgentBackend>, roster: Roster) -> Self {
        Self {
            trust,
            backend,
            roster,
            config: DebateConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DebateConfig) -> Self {
        self.config = config;
        self
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    fn select(&self, requested: Option<&[String]>) -> Result<Vec<&Persona>, DebateError> {
        let selection = self.roster.select(requested);
        for unknown in &selection.unknown {
            warn!(agent = %unknown, known = ?self.roster.ids(), "Dropping unknown agent");
        }
        if selection.personas.is_empty() {
            return Err(DebateError::NoAgents);
        }
        Ok(selection.personas)
    }

    /// Ask every selected agent concurrently and pick the highest-trust answer.
    pub async fn consensus(
        &self,
        task: &str,
        requested: Option<&[String]>,
    ) -> Result<ConsensusReport, DebateError> {
        let personas = self.select(requested)?;
        info!(agents = personas.len(), "Starting consensus");

        let calls = personas.iter().map(|persona| async move {
            let result = self.backend.ask(persona, &persona.role_prompt, task).await;
            (*persona, result)
        });
        let results = futures::future::join_all(calls).await;

        let mut responses = Vec::new();
        let mut failures = Vec::new();
        for (persona, result) in results {
            match result {
                Ok(text) => responses.push(AgentResponse {
                    agent: persona.id.clone(),
                    model: persona.model.clone(),
                    text,
                    trust: self.trust.get(&persona.id),
                }),
                Err(e) => {
                    warn!(agent = %persona.id, error = %e, "Agent call failed during consensus");
                    failures.push(AgentFailure {
                        agent: persona.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let failed = failures.clone();
        let report = ConsensusReport::from_responses(task, responses, failures)
            .ok_or(DebateError::AllAgentsFailed(failed))?;
        info!(
            winner = %report.consensus_agent,
            responses = report.responses.len(),
            "Consensus reached"
        );
        Ok(report)
    }

    /// Run the three rounds, the optional summary, then the judge and trust updates.
    pub async fn debate(
        &self,
        task: &str,
        requested: Option<&[String]>,
    ) -> Result<DebateReport, DebateError> {
        let personas = self.select(requested)?;
        let id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(debate_id = %id, agents = personas.len(), "Starting debate");

        let mut transcript = Transcript::new();
        let mut failures = Vec::new();

        for round in Round::ALL {
            for persona in &personas {
                let message = turn_message(task, &transcript.history(), round, &persona.id);
                match self.backend.ask(persona, &persona.role_prompt, &message).await {
                    Ok(text) => {
                        debug!(agent = %persona.id, %round, chars = text.len(), "Turn recorded");
                        transcript.push(&persona.id, round, text);
                    }
                    Err(e) => {
                        warn!(agent = %persona.id, %round, error = %e, "Agent call failed during debate");
                        failures.push(AgentFailure {
                            agent: persona.id.clone(),
                            error: format!("round {}: {e}", round.index() + 1),
                        });
                    }
                }
            }
        }

        if transcript.is_empty() {
            return Err(DebateError::AllAgentsFailed(failures));
        }

        let lead = personas[0];
        let plain = transcript.history();

        let summary = if self.config.summarize {
            let message = format!("TASK: {task}\n\n{plain}\n\nConverged action plan:");
            match self.backend.ask(lead, SUMMARY_SYSTEM_PROMPT, &message).await {
                Ok(text) => Some(text),
                Err(e) => {
                    warn!(agent = %lead.id, error = %e, "Summary call failed");
                    None
                }
            }
        } else {
            None
        };

        let judged = match self
            .backend
            .ask(lead, JUDGE_SYSTEM_PROMPT, &judge_message(&plain))
            .await
        {
            Ok(raw) => JudgeOutcome::parse(&raw),
            Err(e) => JudgeOutcome::Ambiguous(format!("judge call failed: {e}")),
        };

        let mut trust_changes = Vec::new();
        let mut held = Vec::new();
        let outcome = match judged {
            JudgeOutcome::Ambiguous(reason) => {
                warn!(debate_id = %id, %reason, "Judge verdict ambiguous, trust unchanged");
                DebateOutcome::Ambiguous(reason)
            }
            JudgeOutcome::Verdicts(verdicts) => {
                for persona in &personas {
                    let Some(verdict) = verdicts.get(&persona.id) else {
                        continue;
                    };
                    let persuader = verdict.persuader().filter(|p| {
                        *p != persona.id && personas.iter().any(|other| other.id == *p)
                    });
                    match (verdict.changed_mind, persuader) {
                        (true, Some(persuader)) => {
                            let before = self.trust.get(&persuader);
                            let after = self.trust.update(&persuader, true)?;
                            info!(
                                persuader = %persuader,
                                persuaded = %persona.id,
                                before,
                                after,
                                "Trust raised for persuasion"
                            );
                            trust_changes.push(TrustChange {
                                persuader,
                                persuaded: persona.id.clone(),
                                before,
                                after,
                            });
                        }
                        (true, None) => {
                            debug!(agent = %persona.id, "Changed mind without a valid persuader");
                        }
                        (false, _) => held.push(persona.id.clone()),
                    }
                }
                DebateOutcome::Judged
            }
        };

        Ok(DebateReport {
            id,
            topic: task.to_string(),
            started_at,
            agents: personas.iter().map(|p| p.id.clone()).collect(),
            transcript,
            summary,
            outcome,
            trust_changes,
            held,
            failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::InMemoryTrustStore;
    use std::sync::Mutex;

    /// Replies with a fixed judge JSON and echoes everything else.
    struct ScriptedBackend {
        judge_reply: String,
        failing: Vec<String>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedBackend {
        fn new(judge_reply: &str) -> Self {
            Self {
                judge_reply: judge_reply.to_string(),
                failing: Vec::new(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AgentBackend for ScriptedBackend {
        async fn ask(
            &self,
            persona: &Persona,
            system: &str,
            user: &str,
        ) -> Result<String, BackendError> {
            self.calls
                .lock()
                .unwrap()
                .push((persona.id.clone(), user.to_string()));
            if self.failing.contains(&persona.id) {
                return Err(BackendError::Request("boom".to_string()));
            }
            if system == JUDGE_SYSTEM_PROMPT {
                return Ok(self.judge_reply.clone());
            }
            Ok(format!("{} speaks", persona.id))
        }
    }

    fn orchestrator(backend: ScriptedBackend) -> (DebateOrchestrator, Arc<ScriptedBackend>) {
        let backend = Arc::new(backend);
        let trust: Arc<dyn TrustStore> = Arc::new(InMemoryTrustStore::new());
        (
            DebateOrchestrator::new(trust, backend.clone(), Roster::default()),
            backend,
        )
    }

    #[tokio::test]
    async fn test_later_turns_see_same_round_peers() {
        let (orch, backend) = orchestrator(ScriptedBackend::new("{}"));
        orch.debate("Pick a queue", None).await.unwrap();

        let calls = backend.calls.lock().unwrap();
        // 9 turns, 1 summary, 1 judge
        assert_eq!(calls.len(), 11);
        assert!(calls[0].1.contains("(no prior messages)"));
        assert!(calls[1].1.contains("@architect: architect speaks"));
        assert!(calls[2].1.contains("@pragmatist: pragmatist speaks"));
    }

    #[tokio::test]
    async fn test_self_persuasion_ignored() {
        let (orch, _) = orchestrator(ScriptedBackend::new(
            r#"{"critic": {"changed_mind": true, "influenced_by": "critic"}}"#,
        ));
        let report = orch.debate("t", None).await.unwrap();
        assert_eq!(report.outcome, DebateOutcome::Judged);
        assert!(report.trust_changes.is_empty());
    }

    #[tokio::test]
    async fn test_outsider_persuader_ignored() {
        let (orch, _) = orchestrator(ScriptedBackend::new(
            r#"{"critic": {"changed_mind": true, "influenced_by": "architect"}}"#,
        ));
        let requested = vec!["critic".to_string(), "pragmatist".to_string()];
        let report = orch.debate("t", Some(&requested)).await.unwrap();
        assert!(report.trust_changes.is_empty());
        assert_eq!(orch.trust.get("architect"), 0.85);
    }

    #[tokio::test]
    async fn test_unknown_only_selection_is_error() {
        let (orch, _) = orchestrator(ScriptedBackend::new("{}"));
        let requested = vec!["ghost".to_string()];
        let err = orch.consensus("t", Some(&requested)).await.unwrap_err();
        assert!(matches!(err, DebateError::NoAgents));
    }

    #[tokio::test]
    async fn test_failed_turns_recorded() {
        let mut backend = ScriptedBackend::new("{}");
        backend.failing = vec!["pragmatist".to_string()];
        let (orch, _) = orchestrator(backend);
        let report = orch.debate("t", None).await.unwrap();
        assert_eq!(report.transcript.len(), 6);
        assert_eq!(report.failures.len(), 3);
        assert!(report.failures[0].error.starts_with("round 1:"));
    }

    #[tokio::test]
    async fn test_held_agents_listed() {
        let (orch, _) = orchestrator(ScriptedBackend::new(
            r#"{"architect": {"changed_mind": false}}"#,
        ));
        let report = orch.debate("t", None).await.unwrap();
        assert_eq!(report.held, vec!["architect"]);
        assert!(report.render().contains("@architect held position"));
    }
}
