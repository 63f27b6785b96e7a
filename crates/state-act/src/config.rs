//! Agent configuration
//!
//! Shares llm.toml with llm-core: the `[ollama]`, `[models]`,
//! `[generation]` and `[retry]` sections configure the model client, while
//! `[agent]` and `[[tools.facts]]` configure the loop.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::tools::builtin::{default_facts, Fact};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(flatten)]
    pub llm: llm_core::Config,

    #[serde(default)]
    pub agent: AgentSettings,

    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Loop settings
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSettings {
    /// Reasoning steps allowed before the run is reported incomplete
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Extra attempts when the model's output does not match the schema
    #[serde(default)]
    pub schema_retries: u32,

    /// Per tool call deadline
    #[serde(default)]
    pub tool_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolsConfig {
    /// Facts served by the web_search tool
    #[serde(default = "default_facts")]
    pub facts: Vec<Fact>,
}

fn default_max_iterations() -> usize {
    10
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            schema_retries: 0,
            tool_timeout_secs: None,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            facts: default_facts(),
        }
    }
}

impl AgentSettings {
    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool_timeout_secs.map(Duration::from_secs)
    }
}

impl AppConfig {
    /// Load from `path`, or from llm.toml in the working directory or its
    /// parents, or fall back to defaults when neither exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => match llm_core::Config::find_config_path() {
                Ok(found) => Self::load_from(found),
                Err(_) => Ok(Self::default()),
            },
        }
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }
}
