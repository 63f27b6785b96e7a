//! Reasoning step: ask the backend to update the plan and pick the next action

use std::sync::Arc;

use llm_core::RetryConfig;
use tracing::{debug, info, instrument, warn};

use super::prompt::build_prompt;
use super::response::AgentResponse;
use super::state::{Action, AgentState, StateUpdate};
use crate::backend::StructuredBackend;
use crate::error::AgentError;
use crate::tools::ToolRegistry;

pub struct ReasoningStep {
    backend: Arc<dyn StructuredBackend>,
    registry: Arc<ToolRegistry>,
    schema_retries: u32,
    backoff: RetryConfig,
}

impl ReasoningStep {
    pub fn new(backend: Arc<dyn StructuredBackend>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            backend,
            registry,
            schema_retries: 0,
            backoff: RetryConfig::default(),
        }
    }

    /// Re-ask the backend up to `retries` times when its output does not parse
    pub fn with_schema_retries(mut self, retries: u32, backoff: RetryConfig) -> Self {
        self.schema_retries = retries;
        self.backoff = backoff;
        self
    }

    /// Produce the next state.
    ///
    /// When the plan is complete and an answer exists the backend is not
    /// called; the state comes back with `action = finish`, overriding any
    /// stale action left from an earlier turn.
    #[instrument(skip_all, fields(plan_steps = state.plan.len()))]
    pub async fn reason(&self, state: &AgentState) -> Result<AgentState, AgentError> {
        if state.is_done() {
            debug!("Plan complete with final answer, skipping backend");
            return Ok(state.merge(StateUpdate::action(Some(Action::Finish))));
        }

        let prompt = build_prompt(state, &self.registry.describe_all());
        let schema = AgentResponse::schema();

        let mut attempt = 0;
        let response = loop {
            let raw = self
                .backend
                .generate(&prompt, &schema)
                .await
                .map_err(AgentError::Backend)?;

            match AgentResponse::parse(&raw) {
                Ok(response) => break response,
                Err(e) if attempt < self.schema_retries => {
                    warn!(error = %e, attempt, "Malformed backend response, retrying");
                    tokio::time::sleep(self.backoff.delay_for(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };

        info!(
            thought = %response.thought,
            action = %response.action,
            "Reasoning complete"
        );
        Ok(state.merge(response.into_update()))
    }
}

impl std::fmt::Debug for ReasoningStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReasoningStep")
            .field("registry", &self.registry)
            .field("schema_retries", &self.schema_retries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ScriptedBackend;
    use crate::tools::builtin::{create_default_registry, default_facts};
    use serde_json::json;
    use std::time::Duration;

    fn registry() -> Arc<ToolRegistry> {
        Arc::new(create_default_registry(default_facts()).unwrap())
    }

    fn step(backend: &Arc<ScriptedBackend>) -> ReasoningStep {
        ReasoningStep::new(backend.clone(), registry())
    }

    fn search_response() -> serde_json::Value {
        json!({
            "thought": "Look up X.",
            "plan": ["find X", "answer"],
            "knowledge_summary": "Nothing yet.",
            "action": "web_search",
            "action_input": {"query": "X"},
            "final_answer": null
        })
    }

    fn initial() -> AgentState {
        AgentState::new("q", "g", vec!["find X".into(), "answer".into()])
    }

    #[tokio::test]
    async fn test_reason_applies_response() {
        let backend = Arc::new(ScriptedBackend::from_values(vec![search_response()]));
        let next = step(&backend).reason(&initial()).await.unwrap();

        assert_eq!(next.action, Some(Action::Tool("web_search".into())));
        assert_eq!(next.action_input_value(), json!({"query": "X"}));
        assert_eq!(next.knowledge_summary, "Nothing yet.");
        assert_eq!(next.question, "q");
        assert_eq!(backend.call_count(), 1);
        assert!(backend.prompts()[0].contains("- web_search:"));
    }

    #[tokio::test]
    async fn test_short_circuit_skips_backend() {
        let backend = Arc::new(ScriptedBackend::new(Vec::<String>::new()));
        let mut state = AgentState::new("q", "g", vec!["[x] find X".into(), "[x] answer".into()]);
        state.final_answer = Some("X".into());
        state.action = Some(Action::Tool("web_search".into()));

        let reasoning = step(&backend);
        let next = reasoning.reason(&state).await.unwrap();
        assert_eq!(next.action, Some(Action::Finish));
        assert_eq!(next.final_answer.as_deref(), Some("X"));

        // idempotent
        let again = reasoning.reason(&next).await.unwrap();
        assert_eq!(again, next);
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_complete_plan_without_answer_calls_backend() {
        let backend = Arc::new(ScriptedBackend::from_values(vec![search_response()]));
        let state = AgentState::new("q", "g", vec!["[x] done".into()]);
        step(&backend).reason(&state).await.unwrap();
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_response_is_fatal_by_default() {
        let backend = Arc::new(ScriptedBackend::new(["not json", "also not json"]));
        let err = step(&backend).reason(&initial()).await.unwrap_err();
        assert!(err.is_schema_violation());
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_schema_retries_recover() {
        let backend = Arc::new(ScriptedBackend::from_values(vec![
            json!("garbage"),
            search_response(),
        ]));
        let backoff = RetryConfig {
            max_retries: 0,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(1),
        };
        let reasoning = step(&backend).with_schema_retries(1, backoff);

        let next = reasoning.reason(&initial()).await.unwrap();
        assert_eq!(next.action, Some(Action::Tool("web_search".into())));
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_backend_failure_is_backend_error() {
        let backend = Arc::new(ScriptedBackend::new(Vec::<String>::new()));
        let err = step(&backend).reason(&initial()).await.unwrap_err();
        assert!(matches!(err, AgentError::Backend(_)));
    }
}
