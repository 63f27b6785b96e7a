//! Construction of the chat and embedding model handles used by agents

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::config::Config;
use crate::ollama::{ChatMessage, ChatOptions, ChatRequest, OllamaClient, ResponseFormat};

/// Chat model bound to a client and default sampling options
#[derive(Debug, Clone)]
pub struct ChatModel {
    client: OllamaClient,
    model: String,
    options: ChatOptions,
}

impl ChatModel {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            options: ChatOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn options(&self) -> &ChatOptions {
        &self.options
    }

    /// Run one chat turn and return the assistant's text
    pub async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        format: Option<ResponseFormat>,
    ) -> Result<String> {
        let mut request =
            ChatRequest::new(self.model.clone(), messages).with_options(self.options.clone());
        if let Some(format) = format {
            request = request.with_format(format);
        }

        let resp = self.client.chat(&request).await?;
        Ok(resp.message.content)
    }
}

/// Embedding model bound to a client
#[derive(Debug, Clone)]
pub struct EmbeddingModel {
    client: OllamaClient,
    model: String,
}

impl EmbeddingModel {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        self.client.embed(&self.model, inputs).await
    }
}

/// The pair of model handles every example needs
#[derive(Debug, Clone)]
pub struct ModelClients {
    pub chat: ChatModel,
    pub embeddings: EmbeddingModel,
}

impl ModelClients {
    /// Build both handles from config without contacting the server
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = OllamaClient::new(config.ollama_url())?
            .with_retry(config.retry.to_retry_config());

        Ok(Self {
            chat: ChatModel::new(client.clone(), config.models.chat.clone())
                .with_options(config.generation.to_options()),
            embeddings: EmbeddingModel::new(client, config.models.embedding.clone()),
        })
    }

    /// Build both handles and verify the Ollama service answers
    pub async fn connect(config: &Config) -> Result<Self> {
        let clients = Self::from_config(config)?;
        let url = config.ollama_url();

        let healthy = clients
            .chat
            .client
            .health_check()
            .await
            .with_context(|| format!("Error connecting to Ollama at {}", url))?;
        if !healthy {
            bail!(
                "Error connecting to Ollama at {}. Is the Ollama service running?",
                url
            );
        }

        info!(
            url = %url,
            chat_model = %clients.chat.model,
            embedding_model = %clients.embeddings.model,
            "Connected to Ollama"
        );
        Ok(clients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(uri: &str) -> Config {
        let url = uri.trim_start_matches("http://");
        let (host, port) = url.split_once(':').unwrap();
        let mut config = Config::default();
        config.ollama.host = host.to_string();
        config.ollama.port = port.parse().unwrap();
        config.models.chat = "custom-llm".to_string();
        config.models.embedding = "custom-embed".to_string();
        config
    }

    #[tokio::test]
    async fn test_connect_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": []})))
            .mount(&server)
            .await;

        let clients = ModelClients::connect(&config_for(&server.uri())).await.unwrap();
        assert_eq!(clients.chat.model(), "custom-llm");
        assert_eq!(clients.embeddings.model(), "custom-embed");
        assert_eq!(clients.chat.options().temperature, Some(0.0));
    }

    #[tokio::test]
    async fn test_connect_failure_mentions_service() {
        let config = config_for("http://127.0.0.1:9");
        let err = ModelClients::connect(&config).await.unwrap_err();
        assert!(err.to_string().contains("Is the Ollama service running?"));
    }

    #[tokio::test]
    async fn test_chat_model_complete_passes_schema() {
        let server = MockServer::start().await;
        let schema = json!({"type": "object"});
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({"model": "custom-llm", "format": {"type": "object"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {"role": "assistant", "content": "{}"},
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let clients = ModelClients::from_config(&config_for(&server.uri())).unwrap();
        let content = clients
            .chat
            .complete(vec![ChatMessage::user("hi")], Some(ResponseFormat::Schema(schema)))
            .await
            .unwrap();
        assert_eq!(content, "{}");
    }
}
