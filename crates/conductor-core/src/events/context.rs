//! Per-run event context: the message log plus the worker activity flags.

use super::message::MessageKind;
use super::message_log::{LogVersion, MessageLog};
use super::server::ServerEvent;

/// Everything the worker has reported during one session run.
///
/// Owned by the session controller. Consumers only ever see clones taken
/// into a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventContext {
    generation: u64,
    log: MessageLog,
    model_loading: bool,
    user_request: bool,
}

impl EventContext {
    /// A fresh, empty context for the run identified by `generation`.
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            ..Self::default()
        }
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    /// True while a model call is in flight.
    pub fn model_loading(&self) -> bool {
        self.model_loading
    }

    /// True while the agent waits for the user to answer.
    pub fn user_request(&self) -> bool {
        self.user_request
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn version(&self) -> LogVersion {
        LogVersion {
            generation: self.generation,
            len: self.log.len(),
        }
    }

    /// Fold one worker event into the context.
    pub(crate) fn apply(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::Task { content } => {
                self.log.push(MessageKind::Task, content.as_str());
            }
            ServerEvent::ModelRequest => self.model_loading = true,
            ServerEvent::ModelResponse { thought, action } => {
                self.model_loading = false;
                self.log.push(MessageKind::Thought, thought.as_str());
                if let Some(action) = action {
                    self.log.push(MessageKind::Command, action.as_str());
                }
            }
            ServerEvent::ToolResponse { content } => {
                self.log.push(MessageKind::Tool, content.as_str());
            }
            ServerEvent::UserRequest { content } => {
                self.log.push(MessageKind::Agent, content.as_str());
                self.user_request = true;
            }
            ServerEvent::UserResponse { content } => {
                self.log.push(MessageKind::User, content.as_str());
                self.user_request = false;
            }
            ServerEvent::Interrupt { content } => {
                self.log.push(MessageKind::User, content.as_str());
            }
            ServerEvent::Error { content } => {
                self.log.push(MessageKind::Error, content.as_str());
                self.model_loading = false;
            }
            ServerEvent::RateLimit => {
                self.log.push(MessageKind::RateLimit, "");
            }
            ServerEvent::Stop => {
                self.model_loading = false;
                self.user_request = false;
            }
            ServerEvent::Unknown => {}
        }
    }
}
