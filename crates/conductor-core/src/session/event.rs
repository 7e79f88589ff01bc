//! Events accepted by the session controller and the effects they request.

use crate::backend::BackendError;
use crate::events::ServerEvent;
use crate::healthcheck::FatalNotice;

use super::state::AgentConfig;

/// Input to the session controller.
///
/// Variants that carry an `epoch` are follow-ups produced by asynchronous
/// work. The controller discards them when the epoch no longer matches the
/// current attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    // === Commands ===
    /// Create a worker session for a project directory.
    Create {
        path: String,
        agent_config: AgentConfig,
    },

    /// Start the agent loop of the created session.
    Init { agent_config: AgentConfig },

    /// Flip between running and paused.
    Toggle,

    /// Answer the agent.
    SendMessage { text: String },

    /// Interrupt the agent.
    Interrupt { text: String },

    /// Request navigation to a message.
    SelectCheckpoint { index: usize },

    /// The consumer finished navigating to the selected checkpoint.
    NavigationComplete,

    /// Tear the session down and start a new attempt.
    Reset,

    // === Follow-ups ===
    HealthcheckResult {
        epoch: u64,
        result: Result<(), BackendError>,
    },

    CreationComplete {
        epoch: u64,
        result: Result<(), BackendError>,
    },

    InitComplete {
        epoch: u64,
        result: Result<(), BackendError>,
    },

    ServerEvents {
        epoch: u64,
        events: Vec<ServerEvent>,
    },

    ResetComplete { epoch: u64 },
}

impl SessionEvent {
    pub fn create(path: impl Into<String>, agent_config: AgentConfig) -> Self {
        SessionEvent::Create {
            path: path.into(),
            agent_config,
        }
    }

    pub fn init(agent_config: AgentConfig) -> Self {
        SessionEvent::Init { agent_config }
    }

    /// Epoch of a follow-up event; `None` for commands.
    pub fn epoch(&self) -> Option<u64> {
        match self {
            SessionEvent::HealthcheckResult { epoch, .. }
            | SessionEvent::CreationComplete { epoch, .. }
            | SessionEvent::InitComplete { epoch, .. }
            | SessionEvent::ServerEvents { epoch, .. }
            | SessionEvent::ResetComplete { epoch } => Some(*epoch),
            _ => None,
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Create { .. } => "session.create",
            SessionEvent::Init { .. } => "session.init",
            SessionEvent::Toggle => "session.toggle",
            SessionEvent::SendMessage { .. } => "session.sendMessage",
            SessionEvent::Interrupt { .. } => "session.interrupt",
            SessionEvent::SelectCheckpoint { .. } => "checkpoint.select",
            SessionEvent::NavigationComplete => "checkpoint.navigated",
            SessionEvent::Reset => "session.reset",
            SessionEvent::HealthcheckResult { .. } => "session.healthcheckResult",
            SessionEvent::CreationComplete { .. } => "session.creationComplete",
            SessionEvent::InitComplete { .. } => "session.initComplete",
            SessionEvent::ServerEvents { .. } => "session.serverEvents",
            SessionEvent::ResetComplete { .. } => "session.resetComplete",
        }
    }
}

/// Work requested by an accepted event, executed outside the dispatch path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Probe the worker. `delayed` spaces out retries.
    ProbeHealth { epoch: u64, delayed: bool },

    CreateSession {
        epoch: u64,
        path: String,
        agent_config: AgentConfig,
    },

    StartSession {
        epoch: u64,
        agent_config: AgentConfig,
    },

    Pause,

    Resume,

    SendMessage { text: String },

    Interrupt { text: String },

    /// Poll worker events for as long as `epoch` stays current.
    StreamEvents { epoch: u64 },

    Teardown { epoch: u64 },

    RaiseFatalNotice(FatalNotice),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_have_no_epoch() {
        assert_eq!(SessionEvent::Toggle.epoch(), None);
        assert_eq!(SessionEvent::Reset.epoch(), None);
        assert_eq!(
            SessionEvent::create("/p", AgentConfig::new("m", "k")).epoch(),
            None
        );
    }

    #[test]
    fn follow_ups_report_epoch() {
        let event = SessionEvent::InitComplete {
            epoch: 3,
            result: Ok(()),
        };
        assert_eq!(event.epoch(), Some(3));
        assert_eq!(SessionEvent::ResetComplete { epoch: 7 }.epoch(), Some(7));
    }

    #[test]
    fn names_are_namespaced() {
        assert_eq!(SessionEvent::Toggle.name(), "session.toggle");
        assert_eq!(
            SessionEvent::SelectCheckpoint { index: 0 }.name(),
            "checkpoint.select"
        );
    }
}
