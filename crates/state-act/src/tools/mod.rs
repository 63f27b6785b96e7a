//! Tool framework for the agent
//!
//! A tool takes a JSON object of named arguments and returns a text
//! observation, or fails with a descriptive error.

pub mod builtin;
pub mod registry;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

pub use registry::ToolRegistry;

/// JSON type accepted by a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Number,
}

impl ParameterType {
    fn accepts(self, value: &Value) -> bool {
        match self {
            ParameterType::String => value.is_string(),
            ParameterType::Number => value.is_number(),
        }
    }
}

impl std::fmt::Display for ParameterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterType::String => write!(f, "string"),
            ParameterType::Number => write!(f, "number"),
        }
    }
}

/// Schema for a tool parameter
#[derive(Debug, Clone, Serialize)]
pub struct ParameterProperty {
    /// Parameter type
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    /// Parameter description
    pub description: String,
}

impl ParameterProperty {
    pub fn string(description: impl Into<String>) -> Self {
        Self {
            param_type: ParameterType::String,
            description: description.into(),
        }
    }

    pub fn number(description: impl Into<String>) -> Self {
        Self {
            param_type: ParameterType::Number,
            description: description.into(),
        }
    }
}

/// Parameters a tool declares, in declaration order
#[derive(Debug, Clone, Default)]
pub struct ParameterSchema {
    properties: Vec<(String, ParameterProperty)>,
    required: Vec<String>,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_property(mut self, name: impl Into<String>, prop: ParameterProperty) -> Self {
        self.properties.push((name.into(), prop));
        self
    }

    pub fn with_required(mut self, name: impl Into<String>, prop: ParameterProperty) -> Self {
        let name = name.into();
        self.required.push(name.clone());
        self.properties.push((name, prop));
        self
    }

    /// Declared parameter names, in order
    pub fn names(&self) -> Vec<&str> {
        self.properties.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&ParameterProperty> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p)
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }

    /// Check that `args` is an object whose keys match the declared parameters.
    ///
    /// `null` counts as an empty object.
    pub fn validate(&self, args: &Value) -> Result<()> {
        let empty = serde_json::Map::new();
        let object = match args {
            Value::Null => &empty,
            Value::Object(map) => map,
            other => bail!("Arguments must be a JSON object, got: {}", other),
        };

        for key in object.keys() {
            if self.get(key).is_none() {
                bail!(
                    "Unexpected argument '{}'. Expected parameters: [{}]",
                    key,
                    self.names().join(", ")
                );
            }
        }

        for name in &self.required {
            if !object.contains_key(name) {
                bail!("Missing required parameter: {}", name);
            }
        }

        for (name, value) in object {
            if let Some(prop) = self.get(name) {
                if !prop.param_type.accepts(value) {
                    bail!("Parameter '{}' must be a {}", name, prop.param_type);
                }
            }
        }

        Ok(())
    }
}

/// What the reasoning prompt shows about a tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolDescription {
    pub name: String,
    pub description: String,
    pub parameters: Vec<String>,
}

/// The Tool trait that all tools must implement
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name
    fn name(&self) -> &str;

    /// Get a description of what the tool does
    fn description(&self) -> &str;

    /// Get the parameter schema
    fn parameters_schema(&self) -> ParameterSchema;

    /// Run the tool with already-validated arguments
    async fn call(&self, args: &Value) -> Result<String>;

    fn describe(&self) -> ToolDescription {
        ToolDescription {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self
                .parameters_schema()
                .names()
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> ParameterSchema {
        ParameterSchema::new()
            .with_required("query", ParameterProperty::string("The search query"))
            .with_property("limit", ParameterProperty::number("Maximum results"))
    }

    #[test]
    fn test_validate_accepts_matching_args() {
        assert!(schema().validate(&json!({"query": "rust"})).is_ok());
        assert!(schema().validate(&json!({"query": "rust", "limit": 3})).is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_key() {
        let err = schema().validate(&json!({"q": "rust"})).unwrap_err();
        assert!(err.to_string().contains("Unexpected argument 'q'"));
        assert!(err.to_string().contains("query, limit"));
    }

    #[test]
    fn test_validate_rejects_missing_required() {
        let err = schema().validate(&json!({"limit": 3})).unwrap_err();
        assert_eq!(err.to_string(), "Missing required parameter: query");
    }

    #[test]
    fn test_validate_rejects_wrong_type() {
        let err = schema().validate(&json!({"query": 5})).unwrap_err();
        assert_eq!(err.to_string(), "Parameter 'query' must be a string");
    }

    #[test]
    fn test_validate_null_and_non_object() {
        let optional = ParameterSchema::new().with_property("x", ParameterProperty::number("x"));
        assert!(optional.validate(&Value::Null).is_ok());
        assert!(optional.validate(&json!("text")).is_err());
        assert!(schema().validate(&Value::Null).is_err());
    }

    #[test]
    fn test_names_keep_declaration_order() {
        assert_eq!(schema().names(), vec!["query", "limit"]);
        assert!(schema().is_required("query"));
        assert!(!schema().is_required("limit"));
    }
}
