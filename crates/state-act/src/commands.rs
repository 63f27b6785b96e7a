//! Command implementations for the state-act CLI

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use llm_core::{ModelClients, OllamaClient, OllamaStatus};
use state_act::agent::{ActionStep, AgentGraph, AgentState, Node, Outcome, ReasoningStep, RunResult};
use state_act::backend::{OllamaBackend, ScriptedBackend, StructuredBackend};
use state_act::tools::builtin::create_default_registry;
use state_act::AppConfig;

// ANSI colors
const GREEN: &str = "\x1b[92m";
const YELLOW: &str = "\x1b[93m";
const CYAN: &str = "\x1b[96m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

const DEMO_QUESTION: &str =
    "Compare PonyVidia's market cap to the GDP of Vinland. What is the difference?";
const DEMO_GOAL: &str =
    "Compare PonyVidia's market cap to the GDP of Vinland and find the difference.";
const DEMO_PLAN: [&str; 4] = [
    "Find PonyVidia's current market cap.",
    "Find Vinland's recent GDP.",
    "Calculate the difference using a clean mathematical expression.",
    "Provide the final answer.",
];

/// Options for a single agent run
#[derive(Debug, Default)]
pub struct RunOptions {
    pub question: Option<String>,
    pub goal: Option<String>,
    pub plan: Vec<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_iterations: Option<usize>,
    pub scripted: Option<PathBuf>,
    pub json: bool,
}

impl RunOptions {
    fn initial_state(&self) -> AgentState {
        let question = self
            .question
            .clone()
            .unwrap_or_else(|| DEMO_QUESTION.to_string());
        let goal = self.goal.clone().unwrap_or_else(|| {
            if self.question.is_some() {
                question.clone()
            } else {
                DEMO_GOAL.to_string()
            }
        });
        let plan = if !self.plan.is_empty() {
            self.plan.clone()
        } else if self.question.is_some() {
            vec!["Answer the question.".to_string()]
        } else {
            DEMO_PLAN.iter().map(|s| s.to_string()).collect()
        };

        AgentState::new(question, goal, plan)
    }
}

/// Run the agent and print the outcome
pub async fn run(options: RunOptions, mut config: AppConfig) -> Result<Outcome> {
    if let Some(model) = &options.model {
        config.llm.models.chat = model.clone();
    }
    if let Some(temperature) = options.temperature {
        config.llm.generation.temperature = temperature;
    }
    let max_iterations = options.max_iterations.unwrap_or(config.agent.max_iterations);

    let registry = Arc::new(create_default_registry(config.tools.facts.clone())?);

    let backend: Arc<dyn StructuredBackend> = match &options.scripted {
        Some(path) => Arc::new(ScriptedBackend::from_file(path)?),
        None => {
            let clients = ModelClients::connect(&config.llm).await?;
            Arc::new(OllamaBackend::new(clients.chat))
        }
    };

    let graph = AgentGraph::new(
        ReasoningStep::new(backend, Arc::clone(&registry)).with_schema_retries(
            config.agent.schema_retries,
            config.llm.retry.to_retry_config(),
        ),
        ActionStep::new(registry).with_tool_timeout(config.agent.tool_timeout()),
    );

    let initial = options.initial_state();
    let verbose = !options.json;
    if verbose {
        println!("{}Question:{} {}", CYAN, RESET, initial.question);
    }

    let result = graph
        .run_with_observer(initial, max_iterations, |node, iteration, state| {
            if verbose {
                print_step(node, iteration, state);
            }
        })
        .await?;

    if options.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialize result")?
        );
    } else {
        print_result(&result, max_iterations);
    }

    Ok(result.outcome)
}

/// Process exit code for a run; an incomplete run exits with 2
pub fn exit_code(outcome: Outcome) -> ExitCode {
    match outcome {
        Outcome::Incomplete => ExitCode::from(2),
        Outcome::Finished | Outcome::Stopped => ExitCode::SUCCESS,
    }
}

fn print_step(node: Node, iteration: usize, state: &AgentState) {
    match node {
        Node::Reasoning => {
            let action = state
                .action
                .as_ref()
                .map(|a| a.to_string())
                .unwrap_or_else(|| "none".to_string());
            println!(
                "{}[Iteration {}]{} action: {}",
                DIM, iteration, RESET, action
            );
            for step in &state.plan {
                println!("  {}{}{}", DIM, step, RESET);
            }
        }
        Node::Action => {
            for output in &state.tool_outputs {
                println!("  {}[Tool]{} {}", CYAN, RESET, output);
            }
        }
    }
}

fn print_result(result: &RunResult, max_iterations: usize) {
    println!();
    match result.outcome {
        Outcome::Finished => {
            println!("{}Done{} after {} iteration(s)", GREEN, RESET, result.iterations);
            if let Some(answer) = &result.state.final_answer {
                println!("Final Answer: {}", answer);
            }
        }
        Outcome::Stopped => {
            println!("{}Stopped{} without a final answer", YELLOW, RESET);
        }
        Outcome::Incomplete => {
            println!(
                "{}Incomplete{}: reached maximum iterations ({})",
                YELLOW, RESET, max_iterations
            );
            if let Some(action) = &result.state.action {
                println!("Pending action: {}", action);
            }
        }
    }
    println!("Final Knowledge Summary: {}", result.state.knowledge_summary);
}

/// List the registered tools
pub fn tools(config: &AppConfig) -> Result<()> {
    let registry = create_default_registry(config.tools.facts.clone())?;

    for name in registry.names() {
        let Some(tool) = registry.lookup(name) else {
            continue;
        };
        println!("{}{}{}: {}", GREEN, tool.name(), RESET, tool.description());
        let schema = tool.parameters_schema();
        for param in schema.names() {
            if let Some(prop) = schema.get(param) {
                let required = if schema.is_required(param) { " (required)" } else { "" };
                println!(
                    "    {} <{}>{}: {}",
                    param, prop.param_type, required, prop.description
                );
            }
        }
    }

    Ok(())
}

/// Report whether Ollama is reachable and which models it has
pub async fn health(config: &AppConfig) -> Result<ExitCode> {
    let url = config.llm.ollama_url();
    let client = OllamaClient::new(&url)?;

    match client.status().await {
        OllamaStatus::Running => {
            println!("{}Ollama running{} at {}", GREEN, RESET, url);
        }
        OllamaStatus::Stopped => {
            println!("{}Ollama not reachable{} at {}", YELLOW, RESET, url);
            return Ok(ExitCode::FAILURE);
        }
    }

    let models = client.list_models().await?;
    let chat_model = &config.llm.models.chat;
    for model in &models {
        let marker = if &model.name == chat_model { " *" } else { "" };
        println!("  {} ({}){}", model.name, model.size_human(), marker);
    }
    if !models.iter().any(|m| &m.name == chat_model) {
        println!(
            "{}Configured chat model '{}' is not installed{}",
            YELLOW, chat_model, RESET
        );
    }

    Ok(ExitCode::SUCCESS)
}
