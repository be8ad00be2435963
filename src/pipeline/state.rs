use crate::models::Message;

/// Placeholder rendered for a link whose summary could not be produced.
pub const UNAVAILABLE_SENTINEL: &str = "not available";

/// Outcome of summarizing one link.
///
/// Failures stay observable inside the pipeline and only collapse to
/// `UNAVAILABLE_SENTINEL` when rendered into a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkSummary {
    Summary(String),
    Unavailable { reason: String },
}

impl LinkSummary {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        LinkSummary::Unavailable {
            reason: reason.into(),
        }
    }

    /// Text fed to the note summarizer for this link.
    pub fn render(&self) -> &str {
        match self {
            LinkSummary::Summary(text) => text,
            LinkSummary::Unavailable { .. } => UNAVAILABLE_SENTINEL,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, LinkSummary::Summary(_))
    }
}

/// Accumulated state of one note's pipeline run.
///
/// State only grows: stages return a `StateUpdate` and the orchestrator
/// applies it, so no stage can remove or reorder earlier entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineState {
    messages: Vec<Message>,
    links: Vec<String>,
    link_summary: Vec<LinkSummary>,
}

impl PipelineState {
    /// Fresh state holding the note content as the sole user message.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(content)],
            ..Self::default()
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn links(&self) -> &[String] {
        &self.links
    }

    pub fn link_summary(&self) -> &[LinkSummary] {
        &self.link_summary
    }

    /// Merges a stage's delta into the state.
    ///
    /// Messages and links are appended in the order given. Link summaries
    /// are appended in ascending link index, whatever order they finished in.
    pub fn apply(&mut self, update: StateUpdate) {
        let StateUpdate {
            messages,
            links,
            mut link_summaries,
        } = update;

        self.messages.extend(messages);
        self.links.extend(links);
        link_summaries.sort_by_key(|(index, _)| *index);
        self.link_summary
            .extend(link_summaries.into_iter().map(|(_, summary)| summary));
    }
}

/// Partial update returned by a pipeline stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateUpdate {
    messages: Vec<Message>,
    links: Vec<String>,
    link_summaries: Vec<(usize, LinkSummary)>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_links(mut self, links: impl IntoIterator<Item = String>) -> Self {
        self.links.extend(links);
        self
    }

    /// Adds summaries tagged with the index of the link they belong to.
    pub fn with_link_summaries(
        mut self,
        summaries: impl IntoIterator<Item = (usize, LinkSummary)>,
    ) -> Self {
        self.link_summaries.extend(summaries);
        self
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn links(&self) -> &[String] {
        &self.links
    }

    pub fn link_summaries(&self) -> &[(usize, LinkSummary)] {
        &self.link_summaries
    }
}
