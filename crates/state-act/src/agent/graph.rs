//! Loop controller: a two-node graph with one conditional edge
//!
//! ```text
//!  start -> Reasoning --(action is a tool)--> Action
//!              ^  \                              |
//!              |   `--(finish / no action)--> end|
//!              `---------------------------------'
//! ```

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::act::ActionStep;
use super::reason::ReasoningStep;
use super::state::{Action, AgentState};
use crate::error::AgentError;

/// A node of the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Node {
    Reasoning,
    Action,
}

/// Where to go after a reasoning step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Action,
    End,
}

/// The conditional edge out of `Reasoning`
pub fn route_after_reasoning(state: &AgentState) -> Route {
    match &state.action {
        None | Some(Action::Finish) => Route::End,
        Some(Action::Tool(_)) => Route::Action,
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Reached the end with a final answer
    Finished,
    /// Reached the end without a final answer
    Stopped,
    /// Hit the iteration cap; the state is the last one observed
    Incomplete,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub state: AgentState,
    pub outcome: Outcome,
    /// Reasoning visits made
    pub iterations: usize,
    /// Every node visited, in order
    pub visits: Vec<Node>,
}

impl RunResult {
    pub fn is_finished(&self) -> bool {
        self.outcome == Outcome::Finished
    }

    pub fn visit_count(&self, node: Node) -> usize {
        self.visits.iter().filter(|&&n| n == node).count()
    }
}

/// The compiled agent graph
#[derive(Debug)]
pub struct AgentGraph {
    reasoning: ReasoningStep,
    action: ActionStep,
}

impl AgentGraph {
    pub fn new(reasoning: ReasoningStep, action: ActionStep) -> Self {
        Self { reasoning, action }
    }

    /// Run from `initial` until the graph ends or `max_iterations` reasoning
    /// steps have been taken.
    pub async fn run(
        &self,
        initial: AgentState,
        max_iterations: usize,
    ) -> Result<RunResult, AgentError> {
        self.run_with_observer(initial, max_iterations, |_, _, _| {})
            .await
    }

    /// Like [`run`](Self::run), calling `observer(node, iteration, state)`
    /// after every node with the state that node produced.
    #[instrument(skip_all, fields(max_iterations))]
    pub async fn run_with_observer<F>(
        &self,
        initial: AgentState,
        max_iterations: usize,
        mut observer: F,
    ) -> Result<RunResult, AgentError>
    where
        F: FnMut(Node, usize, &AgentState),
    {
        info!("Starting agent loop");
        let mut state = initial;
        let mut visits = Vec::new();
        let mut iteration = 0;

        while iteration < max_iterations {
            iteration += 1;

            debug!(iteration, "Entering reasoning node");
            visits.push(Node::Reasoning);
            state = self.reasoning.reason(&state).await?;
            observer(Node::Reasoning, iteration, &state);

            match route_after_reasoning(&state) {
                Route::End => {
                    let outcome = if state.final_answer.is_some() {
                        Outcome::Finished
                    } else {
                        Outcome::Stopped
                    };
                    info!(iteration, ?outcome, "Agent loop ended");
                    return Ok(RunResult {
                        state,
                        outcome,
                        iterations: iteration,
                        visits,
                    });
                }
                Route::Action => {
                    debug!(iteration, action = ?state.action, "Entering action node");
                    visits.push(Node::Action);
                    state = self.action.act(&state).await;
                    observer(Node::Action, iteration, &state);
                }
            }
        }

        warn!(max_iterations, "Agent reached maximum iterations");
        Ok(RunResult {
            state,
            outcome: Outcome::Incomplete,
            iterations: iteration,
            visits,
        })
    }
}
