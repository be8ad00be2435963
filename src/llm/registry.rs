//! Named model registry.
//!
//! Every pipeline stage picks its model by name. The registry is built once
//! at startup from `ModelSpec`s (or from hand-made models in tests) and is
//! passed into the pipeline, so there is no process-wide model table.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::client::{ChatModel, ModelError, RetryPolicy};
use super::ollama::OllamaChatModelBuilder;
use super::openai::OpenAiChatModelBuilder;

/// Name that always resolves to the registry's default model.
pub const DEFAULT_MODEL_ALIAS: &str = "default";

/// Wire protocol spoken by a model provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Ollama,
    OpenAiCompatible,
}

/// Declarative description of one registered model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    pub provider: Provider,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_retries() -> u32 {
    2
}

fn default_timeout_secs() -> u64 {
    120
}

impl ModelSpec {
    /// Instantiates the provider client described by this spec.
    pub fn build(&self) -> Result<Arc<dyn ChatModel>, ModelError> {
        let retry = RetryPolicy::new(self.max_retries, Duration::from_secs(1));
        let timeout = Duration::from_secs(self.timeout_secs);

        let model: Arc<dyn ChatModel> = match self.provider {
            Provider::Ollama => {
                let mut builder = OllamaChatModelBuilder::new()
                    .name(&self.name)
                    .retry(retry)
                    .timeout(timeout);
                if let Some(url) = &self.base_url {
                    builder = builder.base_url(url);
                }
                if let Some(model) = &self.model {
                    builder = builder.model(model);
                }
                if let Some(temperature) = self.temperature {
                    builder = builder.temperature(temperature);
                }
                Arc::new(builder.build()?)
            }
            Provider::OpenAiCompatible => {
                let mut builder = OpenAiChatModelBuilder::new(&self.name)
                    .retry(retry)
                    .timeout(timeout);
                if let Some(url) = &self.base_url {
                    builder = builder.base_url(url);
                }
                if let Some(model) = &self.model {
                    builder = builder.model(model);
                }
                if let Some(key) = &self.api_key {
                    builder = builder.api_key(key);
                }
                if let Some(temperature) = self.temperature {
                    builder = builder.temperature(temperature);
                }
                Arc::new(builder.build()?)
            }
        };
        Ok(model)
    }
}

/// A fixed set of named chat models with one designated default.
#[derive(Clone)]
pub struct ModelRegistry {
    models: BTreeMap<String, Arc<dyn ChatModel>>,
    default: String,
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.models.keys().collect::<Vec<_>>())
            .field("default", &self.default)
            .finish()
    }
}

impl ModelRegistry {
    /// Creates an empty registry whose default is `default`.
    pub fn new(default: impl Into<String>) -> Self {
        Self {
            models: BTreeMap::new(),
            default: default.into(),
        }
    }

    /// Builds every spec and registers it under its name.
    pub fn from_specs(specs: &[ModelSpec], default: impl Into<String>) -> Result<Self, ModelError> {
        let mut registry = Self::new(default);
        for spec in specs {
            registry.register(spec.name.clone(), spec.build()?);
        }
        if !registry.models.contains_key(&registry.default) {
            return Err(ModelError::UnknownModel(registry.default));
        }
        Ok(registry)
    }

    /// Registers `model` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, model: Arc<dyn ChatModel>) {
        self.models.insert(name.into(), model);
    }

    /// Chainable form of `register`.
    pub fn with_model(mut self, name: impl Into<String>, model: Arc<dyn ChatModel>) -> Self {
        self.register(name, model);
        self
    }

    /// Looks up a model by name.
    ///
    /// `None` and `"default"` resolve to the default model.
    pub fn resolve(&self, name: Option<&str>) -> Result<Arc<dyn ChatModel>, ModelError> {
        let name = match name {
            None | Some(DEFAULT_MODEL_ALIAS) => self.default.as_str(),
            Some(name) => name,
        };
        self.models
            .get(name)
            .cloned()
            .ok_or_else(|| ModelError::UnknownModel(name.to_string()))
    }

    /// Name of the default model.
    pub fn default_name(&self) -> &str {
        &self.default
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }
}
