//! [`AgentBackend`] over the LLM completion service.

use std::sync::Arc;

use async_trait::async_trait;
use coordination::debate::{AgentBackend, BackendError, Persona};
use tracing::debug;

use crate::llm::{CompletionRequest, CompletionService, LlmError};

/// Each persona asks with its own model, temperature and token cap.
pub struct LlmAgentBackend {
    llm: Arc<dyn CompletionService>,
}

impl LlmAgentBackend {
    pub fn new(llm: Arc<dyn CompletionService>) -> Self {
        Self { llm }
    }
}

impl From<LlmError> for BackendError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Timeout(secs) => BackendError::Timeout(secs),
            LlmError::EmptyChoices => BackendError::Empty,
            other => BackendError::Request(other.to_string()),
        }
    }
}

#[async_trait]
impl AgentBackend for LlmAgentBackend {
    async fn ask(&self, persona: &Persona, system: &str, user: &str) -> Result<String, BackendError> {
        let request = CompletionRequest::new(&persona.model, system, user)
            .temperature(persona.temperature)
            .max_tokens(persona.max_tokens);
        let text = self.llm.complete(&request).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(BackendError::Empty);
        }
        debug!(agent = %persona.id, chars = text.len(), "Agent replied");
        Ok(text.to_string())
    }
}
