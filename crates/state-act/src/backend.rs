//! Text-generation backends for the reasoning step

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use llm_core::{ChatMessage, ChatModel, ResponseFormat};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, instrument};

/// A backend that turns a prompt into text that should match `schema`.
///
/// Backends do not parse; the caller decides whether the text conforms.
#[async_trait]
pub trait StructuredBackend: Send + Sync {
    async fn generate(&self, prompt: &str, schema: &Value) -> Result<String>;
}

/// Backend that asks a local Ollama model for schema-constrained JSON
#[derive(Debug, Clone)]
pub struct OllamaBackend {
    chat: ChatModel,
}

impl OllamaBackend {
    pub fn new(chat: ChatModel) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl StructuredBackend for OllamaBackend {
    #[instrument(skip(self, prompt, schema), fields(model = %self.chat.model()))]
    async fn generate(&self, prompt: &str, schema: &Value) -> Result<String> {
        let content = self
            .chat
            .complete(
                vec![ChatMessage::user(prompt)],
                Some(ResponseFormat::Schema(schema.clone())),
            )
            .await?;
        debug!(chars = content.len(), "Backend responded");
        Ok(content)
    }
}

/// Backend that replays canned responses in order.
///
/// Useful for tests and offline demos. Running past the end of the script
/// is a backend error.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    /// Script from JSON values; objects are sent as their JSON text, strings verbatim
    pub fn from_values(values: Vec<Value>) -> Self {
        Self::new(values.into_iter().map(|v| match v {
            Value::String(s) => s,
            other => other.to_string(),
        }))
    }

    /// Load a script from a file holding a JSON array of responses
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script {}", path.display()))?;
        let values: Vec<Value> = serde_json::from_str(&content)
            .with_context(|| format!("Script {} must be a JSON array", path.display()))?;
        Ok(Self::from_values(values))
    }

    /// Number of times `generate` has been called
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every prompt received so far
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().len()
    }
}

#[async_trait]
impl StructuredBackend for ScriptedBackend {
    async fn generate(&self, prompt: &str, _schema: &Value) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.prompts.lock().push(prompt.to_string());
        self.responses
            .lock()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted backend exhausted after {} responses", call - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_scripted_backend_replays_in_order() {
        let backend = ScriptedBackend::new(["one", "two"]);
        let schema = json!({});

        assert_eq!(backend.generate("p1", &schema).await.unwrap(), "one");
        assert_eq!(backend.generate("p2", &schema).await.unwrap(), "two");
        assert_eq!(backend.call_count(), 2);
        assert_eq!(backend.prompts(), vec!["p1", "p2"]);

        let err = backend.generate("p3", &schema).await.unwrap_err();
        assert!(err.to_string().contains("exhausted after 2"));
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn test_from_values_serializes_objects() {
        let backend = ScriptedBackend::from_values(vec![json!({"a": 1}), json!("raw text")]);
        assert_eq!(backend.remaining(), 2);
        assert_eq!(backend.generate("", &json!({})).await.unwrap(), r#"{"a":1}"#);
        assert_eq!(backend.generate("", &json!({})).await.unwrap(), "raw text");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.json");
        std::fs::write(&path, r#"[{"action": "finish"}]"#).unwrap();
        assert_eq!(ScriptedBackend::from_file(&path).unwrap().remaining(), 1);

        std::fs::write(&path, r#"{"not": "an array"}"#).unwrap();
        assert!(ScriptedBackend::from_file(&path).is_err());
    }
}
