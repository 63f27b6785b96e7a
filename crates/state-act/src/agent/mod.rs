//! Plan-act-observe agent
//!
//! A reasoning step updates the plan and picks an action, an action step
//! runs the chosen tool, and the graph alternates between them until the
//! agent finishes or the iteration cap is hit.

mod act;
mod graph;
mod prompt;
mod reason;
mod response;
mod state;

pub use act::ActionStep;
pub use graph::{route_after_reasoning, AgentGraph, Node, Outcome, Route, RunResult};
pub use prompt::{build_prompt, format_toolbox};
pub use reason::ReasoningStep;
pub use response::AgentResponse;
pub use state::{
    is_step_complete, Action, AgentState, StateUpdate, COMPLETION_MARKER, FINISH,
    INITIAL_KNOWLEDGE,
};
