//! Web search tool backed by a fixed table of facts
//!
//! Stands in for a real search engine so runs are reproducible offline.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::tools::{ParameterProperty, ParameterSchema, Tool};

const NO_RESULTS: &str = "No information found. Try a different, more specific query.";

/// A searchable fact: matches when every keyword occurs in the query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    pub keywords: Vec<String>,
    pub answer: String,
}

impl Fact {
    pub fn new(keywords: &[&str], answer: impl Into<String>) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            answer: answer.into(),
        }
    }

    fn matches(&self, query_lower: &str) -> bool {
        !self.keywords.is_empty()
            && self
                .keywords
                .iter()
                .all(|k| query_lower.contains(&k.to_lowercase()))
    }
}

/// Facts available when none are configured
pub fn default_facts() -> Vec<Fact> {
    vec![
        Fact::new(
            &["ponyvidia", "market cap"],
            "PNVDA's market cap is $3.1 Trillion ($3.1e12).",
        ),
        Fact::new(&["vinland", "gdp"], "Vinland's GDP is $2.2 Trillion ($2.2e12)."),
    ]
}

/// Tool for searching factual information
pub struct WebSearchTool {
    facts: Vec<Fact>,
}

impl WebSearchTool {
    pub fn new(facts: Vec<Fact>) -> Self {
        Self { facts }
    }

    fn search(&self, query: &str) -> &str {
        let q = query.to_lowercase();
        self.facts
            .iter()
            .find(|f| f.matches(&q))
            .map(|f| f.answer.as_str())
            .unwrap_or(NO_RESULTS)
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new(default_facts())
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Use this to search for factual information on the web."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::new().with_required("query", ParameterProperty::string("The search query"))
    }

    #[instrument(skip(self, args))]
    async fn call(&self, args: &Value) -> Result<String> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .context("Missing required parameter: query")?;

        let answer = self.search(query);
        debug!(query, hit = answer != NO_RESULTS, "Web search");
        Ok(answer.to_string())
    }
}
