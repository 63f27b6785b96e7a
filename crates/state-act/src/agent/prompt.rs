//! Reasoning prompt construction

use super::response::AgentResponse;
use super::state::AgentState;
use crate::tools::ToolDescription;

/// Render the tool list shown to the model, one `- name: description` line per tool
pub fn format_toolbox(tools: &[ToolDescription]) -> String {
    tools
        .iter()
        .map(|t| {
            if t.parameters.is_empty() {
                format!("- {}: {}", t.name, t.description)
            } else {
                format!(
                    "- {}: {} (input keys: {})",
                    t.name,
                    t.description,
                    t.parameters.join(", ")
                )
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_list(items: &[String]) -> String {
    if items.is_empty() {
        return "[]".to_string();
    }
    serde_json::to_string(items).unwrap_or_else(|_| items.join("; "))
}

/// Build the reasoning prompt for the current state
pub fn build_prompt(state: &AgentState, tools: &[ToolDescription]) -> String {
    format!(
        r#"You are a methodical AI assistant. You must follow the plan and use the tools provided to answer the user's question.

**Toolbox:**
{toolbox}

**Current State:**
- Question: {question}
- Goal: {goal}
- Plan: {plan}
- Knowledge Summary: {knowledge}
- Last Tool Output: {outputs}

**Instructions:**
1.  **Analyze**: Review the 'Last Tool Output' and your current state.
2.  **Update State**: Update your `knowledge_summary` and `plan` based on new information. Prefix a step with '[x]' only after it succeeded.
3.  **Decide Next Step**: Choose the next `action` (a tool name or 'finish') and formulate the `action_input`. Set `final_answer` only when every step is marked '[x]'.
4.  **Output**: You MUST provide your response in the following JSON format.

{format_instructions}
"#,
        toolbox = format_toolbox(tools),
        question = state.question,
        goal = state.overall_goal,
        plan = format_list(&state.plan),
        knowledge = state.knowledge_summary,
        outputs = format_list(&state.tool_outputs),
        format_instructions = AgentResponse::format_instructions(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tools() -> Vec<ToolDescription> {
        vec![
            ToolDescription {
                name: "web_search".into(),
                description: "Search the web.".into(),
                parameters: vec!["query".into()],
            },
            ToolDescription {
                name: "clock".into(),
                description: "Current time.".into(),
                parameters: vec![],
            },
        ]
    }

    #[test]
    fn test_format_toolbox() {
        assert_eq!(
            format_toolbox(&tools()),
            "- web_search: Search the web. (input keys: query)\n- clock: Current time."
        );
    }

    #[test]
    fn test_prompt_contains_state() {
        let mut state = AgentState::new("Q?", "Answer Q", vec!["[x] look".into(), "answer".into()]);
        state.tool_outputs = vec!["Q is 7".into()];

        let prompt = build_prompt(&state, &tools());
        assert!(prompt.contains("- Goal: Answer Q"));
        assert!(prompt.contains(r#"- Plan: ["[x] look","answer"]"#));
        assert!(prompt.contains(r#"- Last Tool Output: ["Q is 7"]"#));
        assert!(prompt.contains("- Knowledge Summary: No information gathered yet."));
        assert!(prompt.contains("- clock: Current time."));
        assert!(prompt.contains("\"action_input\""));
    }

    #[test]
    fn test_prompt_lists_tools_in_given_order() {
        let prompt = build_prompt(&AgentState::new("q", "g", vec![]), &tools());
        let search = prompt.find("- web_search").unwrap();
        let clock = prompt.find("- clock").unwrap();
        assert!(search < clock);
        assert!(prompt.contains("- Last Tool Output: []"));
    }
}
