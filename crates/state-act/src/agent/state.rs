//! Agent state: the single record threaded through the loop

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Prefix that marks a plan step as done
pub const COMPLETION_MARKER: &str = "[x]";

/// Knowledge summary of a freshly created state
pub const INITIAL_KNOWLEDGE: &str = "No information gathered yet.";

/// Action name that ends the loop
pub const FINISH: &str = "finish";

/// What the agent wants to do next
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Action {
    /// Stop; the plan is done or nothing more can be done
    Finish,
    /// Invoke the named tool
    Tool(String),
}

impl Action {
    /// Parse a backend-supplied action name. Empty names mean "no action".
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() {
            None
        } else if name.eq_ignore_ascii_case(FINISH) {
            Some(Action::Finish)
        } else {
            Some(Action::Tool(name.to_string()))
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Action::Finish => FINISH,
            Action::Tool(name) => name,
        }
    }

    pub fn is_finish(&self) -> bool {
        matches!(self, Action::Finish)
    }
}

impl TryFrom<String> for Action {
    type Error = String;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Action::parse(&name).ok_or_else(|| "action name is empty".to_string())
    }
}

/// A blank action string in a serialized state means "no action"
fn deserialize_action<'de, D>(deserializer: D) -> Result<Option<Action>, D::Error>
where
    D: Deserializer<'de>,
{
    let name = Option::<String>::deserialize(deserializer)?;
    Ok(name.as_deref().and_then(Action::parse))
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.name().to_string()
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// True when `step` starts with the completion marker (leading whitespace ignored)
pub fn is_step_complete(step: &str) -> bool {
    step.trim_start().starts_with(COMPLETION_MARKER)
}

/// The central state of the agent.
///
/// Never mutated in place by the loop: each node returns a new value built
/// with [`AgentState::merge`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub overall_goal: String,
    pub plan: Vec<String>,
    pub knowledge_summary: String,
    /// Observations from the most recent action step
    pub tool_outputs: Vec<String>,
    pub question: String,
    pub final_answer: Option<String>,
    #[serde(default, deserialize_with = "deserialize_action")]
    pub action: Option<Action>,
    pub action_input: Option<Map<String, Value>>,
}

/// Fields a node wants to change. `None` keeps the current value.
///
/// Goal and question are absent on purpose: they are fixed for the whole run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub plan: Option<Vec<String>>,
    pub knowledge_summary: Option<String>,
    pub tool_outputs: Option<Vec<String>>,
    pub final_answer: Option<Option<String>>,
    pub action: Option<Option<Action>>,
    pub action_input: Option<Option<Map<String, Value>>>,
}

impl StateUpdate {
    pub fn tool_outputs(outputs: Vec<String>) -> Self {
        Self {
            tool_outputs: Some(outputs),
            ..Default::default()
        }
    }

    pub fn action(action: Option<Action>) -> Self {
        Self {
            action: Some(action),
            ..Default::default()
        }
    }
}

impl AgentState {
    pub fn new(
        question: impl Into<String>,
        overall_goal: impl Into<String>,
        plan: Vec<String>,
    ) -> Self {
        Self {
            overall_goal: overall_goal.into(),
            plan,
            knowledge_summary: INITIAL_KNOWLEDGE.to_string(),
            tool_outputs: Vec::new(),
            question: question.into(),
            final_answer: None,
            action: None,
            action_input: None,
        }
    }

    /// Return a new state with every field set in `update` replaced
    pub fn merge(&self, update: StateUpdate) -> AgentState {
        AgentState {
            overall_goal: self.overall_goal.clone(),
            question: self.question.clone(),
            plan: update.plan.unwrap_or_else(|| self.plan.clone()),
            knowledge_summary: update
                .knowledge_summary
                .unwrap_or_else(|| self.knowledge_summary.clone()),
            tool_outputs: update
                .tool_outputs
                .unwrap_or_else(|| self.tool_outputs.clone()),
            final_answer: update
                .final_answer
                .unwrap_or_else(|| self.final_answer.clone()),
            action: update.action.unwrap_or_else(|| self.action.clone()),
            action_input: update
                .action_input
                .unwrap_or_else(|| self.action_input.clone()),
        }
    }

    /// Every plan step carries the completion marker (vacuously true for an empty plan)
    pub fn is_plan_complete(&self) -> bool {
        self.plan.iter().all(|s| is_step_complete(s))
    }

    /// Plan complete and an answer already recorded: nothing left to reason about
    pub fn is_done(&self) -> bool {
        self.is_plan_complete() && self.final_answer.is_some()
    }

    /// Action input as a JSON value (`null` when absent)
    pub fn action_input_value(&self) -> Value {
        self.action_input
            .clone()
            .map(Value::Object)
            .unwrap_or(Value::Null)
    }
}
