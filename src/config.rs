//! Process configuration: `.env` loading, the model registry built from
//! environment variables, and the document store location.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::llm::{ModelRegistry, ModelSpec, Provider};

/// Environment variable overriding the default model name.
pub const DEFAULT_MODEL_VAR: &str = "NOTEFLOW_DEFAULT_MODEL";

/// Environment variable overriding the store location.
pub const DATABASE_VAR: &str = "NOTEFLOW_DB";

struct HostedModel {
    name: &'static str,
    key_var: &'static str,
    base_url: &'static str,
    model: &'static str,
    temperature: f32,
}

const HOSTED_MODELS: &[HostedModel] = &[
    HostedModel {
        name: "mistral",
        key_var: "MISTRAL_API_KEY",
        base_url: "https://codestral.mistral.ai/v1",
        model: "codestral-latest",
        temperature: 0.6,
    },
    HostedModel {
        name: "gemini",
        key_var: "GOOGLE_API_KEY",
        base_url: "https://generativelanguage.googleapis.com/v1beta/openai",
        model: "gemini-2.5-flash",
        temperature: 0.7,
    },
    HostedModel {
        name: "perplexity",
        key_var: "PPLX_API_KEY",
        base_url: "https://api.perplexity.ai",
        model: "sonar",
        temperature: 0.7,
    },
];

/// Loads `.env` from the working directory or its parents, if present.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "failed to load .env"),
    }
}

/// Model specs and default name derived from `lookup`.
///
/// A hosted model is registered when its API key is set and non-empty.
/// `ollama` is always registered. The default is `NOTEFLOW_DEFAULT_MODEL`
/// when set, else `mistral` when registered, else `ollama`.
pub fn model_specs(lookup: impl Fn(&str) -> Option<String>) -> (Vec<ModelSpec>, String) {
    let mut specs: Vec<ModelSpec> = HOSTED_MODELS
        .iter()
        .filter_map(|hosted| {
            let key = lookup(hosted.key_var).filter(|key| !key.trim().is_empty())?;
            Some(ModelSpec {
                name: hosted.name.to_string(),
                provider: Provider::OpenAiCompatible,
                base_url: Some(hosted.base_url.to_string()),
                model: Some(hosted.model.to_string()),
                api_key: Some(key),
                temperature: Some(hosted.temperature),
                max_retries: 2,
                timeout_secs: 120,
            })
        })
        .collect();

    specs.push(ModelSpec {
        name: "ollama".to_string(),
        provider: Provider::Ollama,
        base_url: lookup("OLLAMA_HOST"),
        model: lookup("OLLAMA_MODEL"),
        api_key: None,
        temperature: None,
        max_retries: 2,
        timeout_secs: 120,
    });

    let default = lookup(DEFAULT_MODEL_VAR)
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| {
            if specs.iter().any(|spec| spec.name == "mistral") {
                "mistral".to_string()
            } else {
                "ollama".to_string()
            }
        });

    (specs, default)
}

/// Builds the model registry from the process environment.
pub fn registry_from_env() -> Result<ModelRegistry> {
    let (specs, default) = model_specs(|name| std::env::var(name).ok());
    let registry = ModelRegistry::from_specs(&specs, &default)
        .with_context(|| format!("Failed to build model registry (default model: {default})"))?;
    tracing::debug!(
        default = %default,
        models = ?registry.names().collect::<Vec<_>>(),
        "model registry ready"
    );
    Ok(registry)
}

/// Resolves the store path: explicit flag, then `NOTEFLOW_DB`, then
/// `{data_dir}/noteflow/notes.db` where `data_dir` is:
/// - Linux: `~/.local/share`
/// - macOS: `~/Library/Application Support`
/// - Windows: `C:\Users\<user>\AppData\Roaming`
pub fn database_path(flag: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = flag {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(DATABASE_VAR).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    let data_dir =
        dirs::data_dir().ok_or_else(|| anyhow::anyhow!("Failed to determine data directory"))?;
    Ok(data_dir.join("noteflow").join("notes.db"))
}

/// Ensures the parent directory of the database file exists.
pub fn ensure_database_directory(db_path: &Path) -> Result<()> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create database directory: {}", parent.display())
        })?;
    }
    Ok(())
}
