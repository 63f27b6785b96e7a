//! Errors that end an agent run.
//!
//! Tool problems are never errors here: they become observations in the
//! state so the next reasoning step can react to them.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    /// The backend answered, but not with the structured response we asked for.
    #[error("backend response does not match the agent response schema: {reason}")]
    SchemaViolation {
        reason: String,
        /// The raw backend output, kept for diagnostics.
        raw: String,
    },

    /// The backend could not be reached or returned an error.
    #[error("backend request failed: {0:#}")]
    Backend(#[source] anyhow::Error),
}

impl AgentError {
    pub fn schema_violation(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::SchemaViolation {
            reason: reason.into(),
            raw: raw.into(),
        }
    }

    pub fn is_schema_violation(&self) -> bool {
        matches!(self, Self::SchemaViolation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = AgentError::schema_violation("missing field `plan`", "{}");
        assert_eq!(
            err.to_string(),
            "backend response does not match the agent response schema: missing field `plan`"
        );
        assert!(err.is_schema_violation());

        let err = AgentError::Backend(anyhow::anyhow!("connection refused"));
        assert_eq!(err.to_string(), "backend request failed: connection refused");
        assert!(!err.is_schema_violation());
    }
}
