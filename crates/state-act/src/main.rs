//! state-act: plan-act-observe agent CLI
//!
//! Runs the agent against a local Ollama model, or against a scripted
//! response file for offline runs.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use state_act::AppConfig;
use tracing_subscriber::EnvFilter;

use commands::RunOptions;

#[derive(Debug, Parser)]
#[command(name = "state-act")]
#[command(about = "Plan-act-observe agent for local LLMs", version)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to llm.toml in this directory or a parent)
    #[arg(short, long, global = true, env = "STATE_ACT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the agent on a question
    Run(RunArgs),

    /// List available tools
    Tools,

    /// Check that Ollama is reachable
    Health,
}

#[derive(Debug, Default, Args)]
struct RunArgs {
    /// Question to answer (runs the built-in demo when omitted)
    question: Option<String>,

    /// Overall goal (defaults to the question)
    #[arg(short, long)]
    goal: Option<String>,

    /// Initial plan step; repeat for more steps
    #[arg(short, long = "plan")]
    plan: Vec<String>,

    /// Model to use (overrides config)
    #[arg(short, long, env = "STATE_ACT_MODEL")]
    model: Option<String>,

    /// Sampling temperature (overrides config)
    #[arg(short, long)]
    temperature: Option<f32>,

    /// Maximum reasoning steps
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Replay responses from a JSON file instead of calling Ollama
    #[arg(long)]
    scripted: Option<PathBuf>,

    /// Output the run result as JSON
    #[arg(long)]
    json: bool,
}

impl From<RunArgs> for RunOptions {
    fn from(args: RunArgs) -> Self {
        Self {
            question: args.question,
            goal: args.goal,
            plan: args.plan,
            model: args.model,
            temperature: args.temperature,
            max_iterations: args.max_iterations,
            scripted: args.scripted,
            json: args.json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Run(args)) => Ok(commands::exit_code(
            commands::run(args.into(), config).await?,
        )),
        Some(Commands::Tools) => {
            commands::tools(&config)?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Health) => commands::health(&config).await,
        // Default to the demo run when no command specified
        None => Ok(commands::exit_code(
            commands::run(RunArgs::default().into(), config).await?,
        )),
    }
}
