//! state-act: a plan-act-observe agent loop for local LLMs
//!
//! The agent keeps an explicit plan and knowledge summary, asks a local
//! Ollama model for structured JSON on every turn, and folds tool results
//! (including tool failures) back into its state.

pub mod agent;
pub mod backend;
pub mod config;
pub mod error;
pub mod tools;

pub use agent::{AgentGraph, AgentState, Outcome, RunResult};
pub use backend::{OllamaBackend, ScriptedBackend, StructuredBackend};
pub use config::AppConfig;
pub use error::AgentError;
pub use tools::{Tool, ToolRegistry};
