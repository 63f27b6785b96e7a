//! Action step: run the chosen tool and record what it returned

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};

use super::state::{Action, AgentState, StateUpdate};
use crate::tools::ToolRegistry;

pub struct ActionStep {
    registry: Arc<ToolRegistry>,
    tool_timeout: Option<Duration>,
}

impl ActionStep {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            tool_timeout: None,
        }
    }

    /// Give every tool call a deadline; expiry is recorded as a tool failure
    pub fn with_tool_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Run the selected tool. Only `tool_outputs` changes.
    ///
    /// Never fails: unknown tools, bad arguments, tool errors, panics, and
    /// timeouts all become the observation the next reasoning step sees.
    #[instrument(skip_all, fields(action = ?state.action.as_ref().map(Action::name)))]
    pub async fn act(&self, state: &AgentState) -> AgentState {
        let observation = self.observe(state).await;
        state.merge(StateUpdate::tool_outputs(vec![observation]))
    }

    async fn observe(&self, state: &AgentState) -> String {
        let name = match &state.action {
            Some(Action::Tool(name)) => name.clone(),
            other => {
                let action = other.as_ref().map(Action::name).unwrap_or("none");
                warn!(action, "Action step reached without a tool");
                return format!(
                    "Error: No tool selected (action: {}). Available tools are: [{}]",
                    action,
                    self.registry.names().join(", ")
                );
            }
        };

        let Some(tool) = self.registry.lookup(&name) else {
            let message = format!(
                "Error: Tool '{}' not found. Available tools are: [{}]",
                name,
                self.registry.names().join(", ")
            );
            warn!(tool = %name, "Tool not found");
            return message;
        };

        let registry = Arc::clone(&self.registry);
        let args = state.action_input_value();
        let mut handle = tokio::spawn(async move { registry.invoke(tool.as_ref(), &args).await });

        let joined = match self.tool_timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    handle.abort();
                    warn!(tool = %name, timeout_secs = limit.as_secs_f64(), "Tool timed out");
                    return format!(
                        "Error executing tool {}: timed out after {}s",
                        name,
                        limit.as_secs_f64()
                    );
                }
            },
            None => handle.await,
        };

        match joined {
            Ok(Ok(output)) => {
                info!(tool = %name, output_len = output.len(), "Tool executed successfully");
                output
            }
            Ok(Err(e)) => {
                warn!(tool = %name, error = %e, "Tool execution failed");
                format!("Error executing tool {}: {:#}", name, e)
            }
            Err(e) => {
                let reason = if e.is_panic() {
                    panic_message(e.into_panic())
                } else {
                    "task was cancelled".to_string()
                };
                warn!(tool = %name, reason = %reason, "Tool panicked");
                format!("Error executing tool {}: {}", name, reason)
            }
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

impl std::fmt::Debug for ActionStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionStep")
            .field("registry", &self.registry)
            .field("tool_timeout", &self.tool_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::builtin::{create_default_registry, default_facts};
    use crate::tools::{ParameterProperty, ParameterSchema, Tool};
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "flaky"
        }

        fn description(&self) -> &str {
            "Always fails"
        }

        fn parameters_schema(&self) -> ParameterSchema {
            ParameterSchema::new()
        }

        async fn call(&self, _args: &Value) -> Result<String> {
            bail!("upstream unavailable")
        }
    }

    struct PanickingTool;

    #[async_trait]
    impl Tool for PanickingTool {
        fn name(&self) -> &str {
            "boom"
        }

        fn description(&self) -> &str {
            "Panics"
        }

        fn parameters_schema(&self) -> ParameterSchema {
            ParameterSchema::new()
        }

        async fn call(&self, _args: &Value) -> Result<String> {
            panic!("index out of range")
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }

        fn description(&self) -> &str {
            "Takes forever"
        }

        fn parameters_schema(&self) -> ParameterSchema {
            ParameterSchema::new().with_property("ms", ParameterProperty::number("Delay"))
        }

        async fn call(&self, _args: &Value) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("finally".into())
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        let mut registry = create_default_registry(default_facts()).unwrap();
        registry.register(FailingTool).unwrap();
        registry.register(PanickingTool).unwrap();
        registry.register(SlowTool).unwrap();
        Arc::new(registry)
    }

    fn state_with(action: &str, input: Value) -> AgentState {
        let mut state = AgentState::new("q", "g", vec!["step".into()]);
        state.action = Action::parse(action);
        state.action_input = input.as_object().cloned();
        state.tool_outputs = vec!["previous".into()];
        state
    }

    #[tokio::test]
    async fn test_act_runs_tool() {
        let state = state_with("calculator", json!({"expression": "3.1e12 - 2.2e12"}));
        let next = ActionStep::new(registry()).act(&state).await;

        assert_eq!(next.tool_outputs, vec!["Calculation result: 900,000,000,000.00"]);
        // only tool_outputs changes
        assert_eq!(next.plan, state.plan);
        assert_eq!(next.action, state.action);
        assert_eq!(next.action_input, state.action_input);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_observation() {
        let state = state_with("time_machine", json!({}));
        let next = ActionStep::new(registry()).act(&state).await;

        assert_eq!(next.tool_outputs.len(), 1);
        let output = &next.tool_outputs[0];
        assert!(output.contains("'time_machine' not found"));
        assert!(output.contains("web_search, calculator"));
    }

    #[tokio::test]
    async fn test_tool_error_is_contained() {
        let next = ActionStep::new(registry()).act(&state_with("flaky", json!({}))).await;
        assert_eq!(
            next.tool_outputs,
            vec!["Error executing tool flaky: upstream unavailable"]
        );
    }

    #[tokio::test]
    async fn test_argument_mismatch_is_contained() {
        let state = state_with("web_search", json!({"q": "Vinland GDP"}));
        let next = ActionStep::new(registry()).act(&state).await;
        let output = &next.tool_outputs[0];
        assert!(output.starts_with("Error executing tool web_search:"));
        assert!(output.contains("Unexpected argument 'q'"));
    }

    #[tokio::test]
    async fn test_tool_panic_is_contained() {
        let next = ActionStep::new(registry()).act(&state_with("boom", json!({}))).await;
        assert_eq!(
            next.tool_outputs,
            vec!["Error executing tool boom: panicked: index out of range"]
        );
    }

    #[tokio::test]
    async fn test_tool_timeout() {
        let step = ActionStep::new(registry()).with_tool_timeout(Some(Duration::from_millis(20)));
        let next = step.act(&state_with("slow", json!({}))).await;
        assert_eq!(next.tool_outputs, vec!["Error executing tool slow: timed out after 0.02s"]);
    }

    #[tokio::test]
    async fn test_deeply_nested_expression_is_contained() {
        let expression = format!("{}1", "-".repeat(200_000));
        let state = state_with("calculator", json!({ "expression": expression }));
        let next = ActionStep::new(registry()).act(&state).await;

        assert_eq!(next.tool_outputs.len(), 1);
        let output = &next.tool_outputs[0];
        assert!(output.starts_with("Error executing tool calculator:"));
        assert!(output.contains("expression nested too deeply"));
    }

    #[tokio::test]
    async fn test_finish_action_is_not_executed() {
        let next = ActionStep::new(registry()).act(&state_with("finish", json!({}))).await;
        assert!(next.tool_outputs[0].starts_with("Error: No tool selected (action: finish)"));
    }
}
