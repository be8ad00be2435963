use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Instruction appended before the note summarizer call in the built-in run.
pub const DEFAULT_SUMMARIZER_MESSAGE: &str = "You are a summariser bot that should provide a short summary of the content of the note, also including the material retrieved from the following links if possible";

/// Instruction appended before the tagger call in the built-in run.
pub const DEFAULT_TAGGER_MESSAGE: &str = "You are a tagging bot that should review the above content, then add appropriate tags. You should return your response as a comma-delimited list. Do not use any spaces in your tags, though an underscore is okay. Do not use commas in your response, except for separating tags. Don't include any wrapping text - only the tags, please.";

const DEFAULT_MAX_PARALLEL_LINKS: usize = 8;

/// Per-run pipeline settings.
///
/// Every field is optional. Model names refer to entries of the
/// `ModelRegistry`; an absent name selects the registry default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    #[serde(alias = "note_summariser_model")]
    pub note_summarizer_model: Option<String>,
    #[serde(alias = "link_summariser_model")]
    pub link_summarizer_model: Option<String>,
    pub tagger_model: Option<String>,
    #[serde(alias = "summariser_message")]
    pub summarizer_message: Option<String>,
    pub tagger_message: Option<String>,
    pub max_parallel_links: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            note_summarizer_model: None,
            link_summarizer_model: None,
            tagger_model: None,
            summarizer_message: None,
            tagger_message: None,
            max_parallel_links: DEFAULT_MAX_PARALLEL_LINKS,
        }
    }
}

impl PipelineConfig {
    /// Default models plus the built-in summarizer and tagger instructions.
    pub fn with_default_instructions() -> Self {
        Self {
            summarizer_message: Some(DEFAULT_SUMMARIZER_MESSAGE.to_string()),
            tagger_message: Some(DEFAULT_TAGGER_MESSAGE.to_string()),
            ..Self::default()
        }
    }

    /// Reads a JSON run configuration.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline config {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid pipeline config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_has_no_instructions() {
        let config = PipelineConfig::default();
        assert!(config.summarizer_message.is_none());
        assert!(config.tagger_message.is_none());
        assert_eq!(config.max_parallel_links, 8);
    }

    #[test]
    fn default_instructions_request_comma_delimited_tags() {
        let config = PipelineConfig::with_default_instructions();
        assert!(config.tagger_message.unwrap().contains("comma-delimited"));
        assert!(config.summarizer_message.is_some());
    }

    #[test]
    fn accepts_british_spelling_aliases() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{"note_summariser_model":"default","link_summariser_model":"gemini","summariser_message":"sum"}"#,
        )
        .unwrap();
        assert_eq!(config.note_summarizer_model.as_deref(), Some("default"));
        assert_eq!(config.link_summarizer_model.as_deref(), Some("gemini"));
        assert_eq!(config.summarizer_message.as_deref(), Some("sum"));
        assert_eq!(config.max_parallel_links, 8);
    }

    #[test]
    fn rejects_unknown_fields() {
        let result: Result<PipelineConfig, _> = serde_json::from_str(r#"{"taggr_model":"x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"tagger_model":"perplexity","max_parallel_links":2}}"#).unwrap();

        let config = PipelineConfig::from_json_file(file.path()).unwrap();

        assert_eq!(config.tagger_model.as_deref(), Some("perplexity"));
        assert_eq!(config.max_parallel_links, 2);
    }

    #[test]
    fn missing_file_is_an_error_with_path() {
        let err = PipelineConfig::from_json_file("/nonexistent/run.json").unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/run.json"));
    }
}
