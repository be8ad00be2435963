/// Chat model invocation.
///
/// This module provides the `ChatModel` trait every pipeline stage invokes,
/// HTTP providers for Ollama and OpenAI-compatible APIs (Mistral, Gemini,
/// Perplexity), the shared retry policy, and the `ModelRegistry` that maps
/// configured model names to instances.
mod client;
mod ollama;
mod openai;
mod registry;

pub use client::{ChatModel, ModelError, RetryPolicy, retry_with_backoff};
pub use ollama::{OllamaChatModel, OllamaChatModelBuilder};
pub use openai::{OpenAiChatModel, OpenAiChatModelBuilder};
pub use registry::{DEFAULT_MODEL_ALIAS, ModelRegistry, ModelSpec, Provider};
