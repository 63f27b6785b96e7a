//! llm-core: Shared library for talking to a local Ollama runtime
//!
//! Provides:
//! - Configuration loading (llm.toml)
//! - Ollama API client (chat with structured output, embeddings, retry)
//! - Model client construction

pub mod config;
pub mod models;
pub mod ollama;

pub use config::Config;
pub use models::{ChatModel, EmbeddingModel, ModelClients};
pub use ollama::{
    ChatMessage, ChatOptions, ChatRequest, ChatResponse, Model, OllamaClient, OllamaStatus,
    ResponseFormat, RetryConfig, Role,
};
