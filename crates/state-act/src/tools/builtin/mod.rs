//! Built-in tools for the agent

mod calculator;
mod web_search;

pub use calculator::{evaluate, format_thousands, CalculatorTool};
pub use web_search::{default_facts, Fact, WebSearchTool};

use anyhow::Result;

use super::registry::ToolRegistry;

/// Create a registry with the default tools: `web_search`, then `calculator`
pub fn create_default_registry(facts: Vec<Fact>) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();

    registry.register(WebSearchTool::new(facts))?;
    registry.register(CalculatorTool)?;

    Ok(registry)
}
