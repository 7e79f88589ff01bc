//! Transcript messages.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// What produced a message, and therefore how a view presents it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageKind {
    /// The task the agent was given.
    Task,
    /// The model's reasoning for its next step.
    Thought,
    /// Text the agent addressed to the user.
    Agent,
    /// A command the agent decided to run.
    Command,
    /// Output returned by a tool.
    Tool,
    /// Text the user sent (responses and interrupts).
    User,
    /// An error reported by the worker.
    Error,
    /// The provider rate-limited the model.
    RateLimit,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Task => "task",
            MessageKind::Thought => "thought",
            MessageKind::Agent => "agent",
            MessageKind::Command => "command",
            MessageKind::Tool => "tool",
            MessageKind::User => "user",
            MessageKind::Error => "error",
            MessageKind::RateLimit => "rateLimit",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single entry of the session transcript.
///
/// Messages are only created by [`super::MessageLog::push`], which assigns
/// the index. There are no mutating accessors, so clones share the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    index: usize,
    #[serde(rename = "type")]
    kind: MessageKind,
    text: Arc<str>,
}

impl Message {
    pub(crate) fn new(index: usize, kind: MessageKind, text: String) -> Self {
        Self {
            index,
            kind,
            text: text.into(),
        }
    }

    /// Position of this message in the authoritative log.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}
