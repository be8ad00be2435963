use std::sync::Arc;

use super::state::{PipelineState, StateUpdate};
use crate::llm::{ChatModel, ModelError};
use crate::models::Message;

/// Condenses the note and its link summaries into one response.
///
/// Runs only after every link task has been joined.
pub struct NoteSummarizer {
    model: Arc<dyn ChatModel>,
    instruction: Option<String>,
}

impl NoteSummarizer {
    pub fn new(model: Arc<dyn ChatModel>, instruction: Option<String>) -> Self {
        Self { model, instruction }
    }

    /// Messages sent to the model: the accumulated history, the optional
    /// instruction, then one message per link summary in link order.
    ///
    /// The instruction and summaries are prompt-only and never enter the
    /// state's message history.
    pub fn prompt(&self, state: &PipelineState) -> Vec<Message> {
        let mut prompt = state.messages().to_vec();
        if let Some(instruction) = &self.instruction {
            prompt.push(Message::user(instruction.as_str()));
        }
        prompt.extend(
            state
                .link_summary()
                .iter()
                .map(|summary| Message::user(summary.render())),
        );
        prompt
    }

    /// Invokes the model and returns an update appending its response.
    pub fn run(&self, state: &PipelineState) -> Result<StateUpdate, ModelError> {
        let prompt = self.prompt(state);
        tracing::debug!(
            model = self.model.name(),
            messages = prompt.len(),
            "summarizing note"
        );
        let response = self.model.invoke(&prompt)?;
        Ok(StateUpdate::new().with_message(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::state::LinkSummary;

    struct CountingModel;

    impl ChatModel for CountingModel {
        fn name(&self) -> &str {
            "counting"
        }

        fn invoke(&self, messages: &[Message]) -> Result<Message, ModelError> {
            Ok(Message::assistant(format!("{} messages", messages.len())))
        }
    }

    struct FailingModel;

    impl ChatModel for FailingModel {
        fn name(&self) -> &str {
            "failing"
        }

        fn invoke(&self, _messages: &[Message]) -> Result<Message, ModelError> {
            Err(ModelError::Http { status: 401 })
        }
    }

    fn state_with_summaries() -> PipelineState {
        let mut state = PipelineState::new("note with https://a.test https://b.test");
        state.apply(
            StateUpdate::new()
                .with_links(["https://a.test".to_string(), "https://b.test".to_string()])
                .with_link_summaries([
                    (1, LinkSummary::unavailable("timeout")),
                    (0, LinkSummary::Summary("A is about apples".into())),
                ]),
        );
        state
    }

    #[test]
    fn prompt_orders_instruction_before_link_summaries() {
        let summarizer = NoteSummarizer::new(Arc::new(CountingModel), Some("summarize".into()));

        let prompt = summarizer.prompt(&state_with_summaries());

        let contents: Vec<_> = prompt.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec![
                "note with https://a.test https://b.test",
                "summarize",
                "A is about apples",
                "not available",
            ]
        );
    }

    #[test]
    fn prompt_without_instruction_or_links_is_just_the_note() {
        let summarizer = NoteSummarizer::new(Arc::new(CountingModel), None);
        let prompt = summarizer.prompt(&PipelineState::new("plain"));
        assert_eq!(prompt, vec![Message::user("plain")]);
    }

    #[test]
    fn run_appends_exactly_one_assistant_message() {
        let summarizer = NoteSummarizer::new(Arc::new(CountingModel), Some("summarize".into()));
        let mut state = state_with_summaries();

        let update = summarizer.run(&state).unwrap();
        assert!(update.links().is_empty());
        assert!(update.link_summaries().is_empty());
        state.apply(update);

        assert_eq!(state.messages().len(), 2);
        assert_eq!(state.messages()[1], Message::assistant("4 messages"));
        assert_eq!(state.link_summary().len(), 2);
    }

    #[test]
    fn model_error_propagates() {
        let summarizer = NoteSummarizer::new(Arc::new(FailingModel), None);
        let result = summarizer.run(&PipelineState::new("note"));
        assert!(matches!(result, Err(ModelError::Http { status: 401 })));
    }
}
