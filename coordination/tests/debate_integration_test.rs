//! Debate and consensus end to end with a scripted backend and a real
//! trust store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use coordination::debate::judge::JUDGE_SYSTEM_PROMPT;
use coordination::debate::{
    AgentBackend, BackendError, DebateError, DebateOrchestrator, DebateOutcome, Persona, Roster,
};
use coordination::trust::{InMemoryTrustStore, JsonTrustStore, TrustStore};

#[derive(Default)]
struct ScriptedBackend {
    judge_reply: String,
    failing: Vec<&'static str>,
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl AgentBackend for ScriptedBackend {
    async fn ask(
        &self,
        persona: &Persona,
        system: &str,
        _user: &str,
    ) -> Result<String, BackendError> {
        let kind = if system == JUDGE_SYSTEM_PROMPT {
            "judge"
        } else if system == persona.role_prompt {
            "turn"
        } else {
            "summary"
        };
        self.calls
            .lock()
            .unwrap()
            .push(format!("{}:{kind}", persona.id));

        if self.failing.contains(&persona.id.as_str()) {
            return Err(BackendError::Timeout(30));
        }
        Ok(match kind {
            "judge" => self.judge_reply.clone(),
            "summary" => "1. Ship the queue\n2. Add retries".to_string(),
            _ => format!("@{} argues its case", persona.id),
        })
    }
}

fn scores(store: &dyn TrustStore) -> HashMap<String, f64> {
    store.all().into_iter().collect()
}

#[tokio::test]
async fn test_persuader_alone_gains_trust() {
    let trust: Arc<dyn TrustStore> = Arc::new(InMemoryTrustStore::new());
    let backend = Arc::new(ScriptedBackend {
        judge_reply: "Here is my analysis.\n```json\n{\
            \"architect\": {\"changed_mind\": true, \"influenced_by\": \"critic\"},\
            \"pragmatist\": {\"changed_mind\": false, \"influenced_by\": null},\
            \"critic\": {\"changed_mind\": false, \"influenced_by\": null}\
        }\n```"
            .to_string(),
        ..Default::default()
    });
    let orchestrator = DebateOrchestrator::new(trust.clone(), backend.clone(), Roster::default());
    let before = scores(trust.as_ref());

    let report = orchestrator
        .debate("Should we replace polling with webhooks?", None)
        .await
        .unwrap();

    assert_eq!(report.transcript.len(), 9);
    assert_eq!(report.outcome, DebateOutcome::Judged);
    assert_eq!(report.trust_changes.len(), 1);
    assert_eq!(report.trust_changes[0].persuader, "critic");
    assert_eq!(report.trust_changes[0].persuaded, "architect");
    assert_eq!(report.held, vec!["pragmatist", "critic"]);
    assert!(report.summary.as_deref().unwrap().contains("Ship the queue"));

    let after = scores(trust.as_ref());
    assert!(after["critic"] > before["critic"]);
    assert_eq!(after["architect"], before["architect"]);
    assert_eq!(after["pragmatist"], before["pragmatist"]);

    let calls = backend.calls.lock().unwrap();
    let order: Vec<&str> = calls.iter().map(String::as_str).collect();
    assert_eq!(
        order,
        vec![
            "architect:turn",
            "pragmatist:turn",
            "critic:turn",
            "architect:turn",
            "pragmatist:turn",
            "critic:turn",
            "architect:turn",
            "pragmatist:turn",
            "critic:turn",
            "architect:summary",
            "architect:judge",
        ]
    );
}

#[tokio::test]
async fn test_malformed_judge_changes_nothing() {
    let trust: Arc<dyn TrustStore> = Arc::new(InMemoryTrustStore::new());
    let backend = Arc::new(ScriptedBackend {
        judge_reply: "I think the critic won, honestly.".to_string(),
        ..Default::default()
    });
    let orchestrator = DebateOrchestrator::new(trust.clone(), backend, Roster::default());
    let before = scores(trust.as_ref());

    let report = orchestrator.debate("Monorepo or not?", None).await.unwrap();

    assert!(matches!(report.outcome, DebateOutcome::Ambiguous(_)));
    assert!(report.trust_changes.is_empty());
    assert_eq!(scores(trust.as_ref()), before);
    assert!(report.render().contains("ambiguous judge verdict"));
}

#[tokio::test]
async fn test_consensus_survives_one_failure() {
    let trust: Arc<dyn TrustStore> = Arc::new(InMemoryTrustStore::new());
    trust.update("pragmatist", true).unwrap();
    let backend = Arc::new(ScriptedBackend {
        failing: vec!["critic"],
        ..Default::default()
    });
    let orchestrator = DebateOrchestrator::new(trust.clone(), backend, Roster::default());

    let report = orchestrator.consensus("Pick a cache", None).await.unwrap();

    assert_eq!(report.responses.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].agent, "critic");
    assert_eq!(report.consensus_agent, "pragmatist");
    assert_eq!(report.consensus, "@pragmatist argues its case");
}

#[tokio::test]
async fn test_consensus_all_failed() {
    let trust: Arc<dyn TrustStore> = Arc::new(InMemoryTrustStore::new());
    let backend = Arc::new(ScriptedBackend {
        failing: vec!["architect", "pragmatist", "critic"],
        ..Default::default()
    });
    let orchestrator = DebateOrchestrator::new(trust, backend, Roster::default());

    match orchestrator.consensus("Pick a cache", None).await {
        Err(DebateError::AllAgentsFailed(failures)) => assert_eq!(failures.len(), 3),
        other => panic!("expected AllAgentsFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_debate_trust_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trust.json");
    let backend = Arc::new(ScriptedBackend {
        judge_reply: r#"{"critic": {"changed_mind": true, "influenced_by": "@pragmatist"}}"#
            .to_string(),
        ..Default::default()
    });

    {
        let trust: Arc<dyn TrustStore> = Arc::new(JsonTrustStore::open(&path).unwrap());
        let orchestrator = DebateOrchestrator::new(trust, backend, Roster::default());
        orchestrator.debate("Tabs or spaces?", None).await.unwrap();
    }

    let reopened = JsonTrustStore::open(&path).unwrap();
    assert!(reopened.get("pragmatist") > 0.85);
    assert_eq!(reopened.get("critic"), 0.85);
}
