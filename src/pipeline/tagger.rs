use std::collections::HashSet;
use std::sync::Arc;

use super::state::{PipelineState, StateUpdate};
use crate::llm::{ChatModel, ModelError};
use crate::models::Message;

/// Derives a tag list from the summarized note.
pub struct Tagger {
    model: Arc<dyn ChatModel>,
    instruction: Option<String>,
}

impl Tagger {
    pub fn new(model: Arc<dyn ChatModel>, instruction: Option<String>) -> Self {
        Self { model, instruction }
    }

    /// Invokes the tagger model over the history plus the optional
    /// instruction and returns an update appending the response.
    pub fn run(&self, state: &PipelineState) -> Result<StateUpdate, ModelError> {
        let mut prompt = state.messages().to_vec();
        if let Some(instruction) = &self.instruction {
            prompt.push(Message::user(instruction.as_str()));
        }

        tracing::debug!(model = self.model.name(), "tagging note");
        let response = self.model.invoke(&prompt)?;
        Ok(StateUpdate::new().with_message(response))
    }
}

/// Parses a comma-delimited model response into tags.
///
/// # Parsing rules
///
/// - Splits on commas and trims each token
/// - Replaces runs of internal whitespace with a single underscore
/// - Drops empty tokens
/// - Drops repeats, keeping the first occurrence
/// - Preserves case and order
///
/// # Examples
///
/// ```
/// use noteflow::pipeline::parse_tag_list;
///
/// assert_eq!(parse_tag_list("work,ideas,follow_up"), vec!["work", "ideas", "follow_up"]);
/// assert_eq!(parse_tag_list(" rust , ,machine learning,"), vec!["rust", "machine_learning"]);
/// assert!(parse_tag_list("").is_empty());
/// ```
#[must_use]
pub fn parse_tag_list(response: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    response
        .split(',')
        .map(|token| token.split_whitespace().collect::<Vec<_>>().join("_"))
        .filter(|tag| !tag.is_empty() && seen.insert(tag.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingModel {
        prompt: Mutex<Vec<Message>>,
    }

    impl ChatModel for RecordingModel {
        fn name(&self) -> &str {
            "recording"
        }

        fn invoke(&self, messages: &[Message]) -> Result<Message, ModelError> {
            *self.prompt.lock().unwrap() = messages.to_vec();
            Ok(Message::assistant("work,ideas,follow_up"))
        }
    }

    #[test]
    fn comma_delimited_response_yields_ordered_tags() {
        assert_eq!(
            parse_tag_list("work,ideas,follow_up"),
            vec!["work", "ideas", "follow_up"]
        );
    }

    #[test]
    fn empty_response_yields_no_tags() {
        assert!(parse_tag_list("").is_empty());
        assert!(parse_tag_list(" , ,\n").is_empty());
    }

    #[test]
    fn tokens_are_trimmed_and_deduplicated() {
        assert_eq!(
            parse_tag_list(" Rust,rust , Rust,  deep  learning "),
            vec!["Rust", "rust", "deep_learning"]
        );
    }

    #[test]
    fn instruction_is_prompt_only() {
        let model = Arc::new(RecordingModel::default());
        let tagger = Tagger::new(model.clone(), Some("tag it".into()));
        let mut state = PipelineState::new("note");
        state.apply(StateUpdate::new().with_message(Message::assistant("summary")));

        let update = tagger.run(&state).unwrap();
        state.apply(update);

        let prompt = model.prompt.lock().unwrap();
        assert_eq!(prompt.last(), Some(&Message::user("tag it")));
        let contents: Vec<_> = state.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["note", "summary", "work,ideas,follow_up"]);
    }
}
