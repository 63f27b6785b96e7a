//! Structured output contract for the reasoning backend

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use tracing::warn;

use super::state::{is_step_complete, Action, StateUpdate};
use crate::error::AgentError;

/// The JSON object the backend must produce on every reasoning step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    /// Reasoning about the current state; logged, never stored
    #[serde(default)]
    pub thought: String,
    pub plan: Vec<String>,
    pub knowledge_summary: String,
    pub action: String,
    #[serde(default, deserialize_with = "object_or_null")]
    pub action_input: Map<String, Value>,
    #[serde(default)]
    pub final_answer: Option<String>,
}

fn object_or_null<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(other) => Err(serde::de::Error::custom(format!(
            "action_input must be a JSON object, got {}",
            other
        ))),
    }
}

impl AgentResponse {
    /// JSON Schema handed to the backend as its output format
    pub fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "thought": {
                    "type": "string",
                    "description": "Your reasoning and analysis of the current state."
                },
                "plan": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "The updated plan. Mark steps with '[x]' only after success."
                },
                "knowledge_summary": {
                    "type": "string",
                    "description": "Concise summary of all gathered facts and calculation results."
                },
                "action": {
                    "type": "string",
                    "description": "The name of the next tool to use from the 'Toolbox' or 'finish'."
                },
                "action_input": {
                    "type": "object",
                    "description": "The input object for the chosen action, e.g. {\"query\": \"...\"} or {\"expression\": \"...\"}."
                },
                "final_answer": {
                    "type": ["string", "null"],
                    "description": "The final answer to the user, only when the plan is fully complete."
                }
            },
            "required": ["thought", "plan", "knowledge_summary", "action", "action_input", "final_answer"]
        })
    }

    /// Prompt text describing the required output
    pub fn format_instructions() -> String {
        let schema = serde_json::to_string_pretty(&Self::schema()).unwrap_or_default();
        format!(
            "Respond with a single JSON object that conforms to the JSON schema below. \
             Do not add any text before or after the JSON.\n\n```\n{}\n```",
            schema
        )
    }

    /// Parse backend output into a response.
    ///
    /// Accepts bare JSON, JSON in a fenced markdown block, or the first
    /// balanced JSON object inside surrounding text.
    pub fn parse(raw: &str) -> Result<AgentResponse, AgentError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AgentError::schema_violation("empty response", raw));
        }

        let mut candidates = vec![trimmed];
        if let Some(block) = extract_json_from_markdown(trimmed) {
            candidates.push(block);
        }
        if let Some(object) = extract_first_object(trimmed) {
            candidates.push(object);
        }

        let mut first_error = None;
        for candidate in candidates {
            match serde_json::from_str::<AgentResponse>(candidate) {
                Ok(response) => return Ok(response),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        let reason = first_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no JSON object found".to_string());
        Err(AgentError::schema_violation(reason, raw))
    }

    /// Turn the response into a state update.
    ///
    /// A final answer only survives when the returned plan is fully marked
    /// complete; blank answers count as absent.
    pub fn into_update(self) -> StateUpdate {
        let plan_complete = self.plan.iter().all(|s| is_step_complete(s));
        let final_answer = match self.final_answer.filter(|a| !a.trim().is_empty()) {
            Some(_) if !plan_complete => {
                warn!(
                    open_steps = self.plan.iter().filter(|s| !is_step_complete(s)).count(),
                    "Discarding final answer: plan is not complete"
                );
                None
            }
            other => other,
        };

        StateUpdate {
            plan: Some(self.plan),
            knowledge_summary: Some(self.knowledge_summary),
            tool_outputs: None,
            final_answer: Some(final_answer),
            action: Some(Action::parse(&self.action)),
            action_input: Some(Some(self.action_input)),
        }
    }
}

/// Extract JSON content from markdown code blocks
fn extract_json_from_markdown(content: &str) -> Option<&str> {
    let patterns = ["```json\n", "```JSON\n", "```\n"];

    for pattern in patterns {
        if let Some(start) = content.find(pattern) {
            let json_start = start + pattern.len();
            if let Some(end) = content[json_start..].find("```") {
                return Some(content[json_start..json_start + end].trim());
            }
        }
    }

    None
}

/// First balanced `{...}` in `content`, skipping braces inside strings
fn extract_first_object(content: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in content.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' if start.is_some() => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return start.map(|s| &content[s..=i]);
                }
            }
            _ => {}
        }
    }

    None
}
