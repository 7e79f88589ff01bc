//! Session lifecycle state, context and snapshots.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::checkpoint::{Checkpoint, CheckpointIndex};
use crate::events::EventContext;
use crate::healthcheck::HealthcheckState;

use super::event::SessionEvent;
use super::machine;

/// Identifier of the worker-side session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Model selection and credentials handed to the worker.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub model: String,
    pub api_key: String,
}

impl AgentConfig {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    /// Both fields are filled in.
    pub fn is_complete(&self) -> bool {
        !self.model.trim().is_empty() && !self.api_key.is_empty()
    }
}

// Keys end up in logs through `{:?}` otherwise.
impl std::fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConfig")
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Phases of the composite `setup` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SetupPhase {
    /// Probing the worker.
    Healthcheck,
    /// Worker is healthy; waiting for a create request.
    Ready,
    Creating,
    /// Session exists on the worker; waiting for an init request.
    Created,
    Initializing,
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "phase", rename_all = "camelCase")]
pub enum SessionState {
    Setup(SetupPhase),
    Running,
    Paused,
    Resetting,
    /// Health probing was abandoned. Only a reset leaves this state.
    Failed,
}

impl SessionState {
    /// Dotted path of the state, e.g. `setup.healthcheck`.
    pub fn path(&self) -> &'static str {
        match self {
            SessionState::Setup(SetupPhase::Healthcheck) => "setup.healthcheck",
            SessionState::Setup(SetupPhase::Ready) => "setup.ready",
            SessionState::Setup(SetupPhase::Creating) => "setup.creating",
            SessionState::Setup(SetupPhase::Created) => "setup.created",
            SessionState::Setup(SetupPhase::Initializing) => "setup.initializing",
            SessionState::Running => "running",
            SessionState::Paused => "paused",
            SessionState::Resetting => "resetting",
            SessionState::Failed => "failed",
        }
    }

    pub fn is_setup(&self) -> bool {
        matches!(self, SessionState::Setup(_))
    }

    /// Running or paused: a session exists and the agent loop was started.
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Running | SessionState::Paused)
    }
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Setup(SetupPhase::Healthcheck)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// Mutable context of a session, owned by the controller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    pub(crate) healthcheck: HealthcheckState,
    pub(crate) server_event_context: EventContext,
    pub(crate) agent_config: Option<AgentConfig>,
    pub(crate) path: Option<String>,
    pub(crate) last_error: Option<String>,
}

impl SessionContext {
    /// Context for a fresh run tagged with `generation`.
    pub(crate) fn new(generation: u64) -> Self {
        Self {
            server_event_context: EventContext::new(generation),
            ..Self::default()
        }
    }

    pub fn healthcheck_retry(&self) -> u32 {
        self.healthcheck.retries()
    }

    pub fn healthcheck(&self) -> &HealthcheckState {
        &self.healthcheck
    }

    pub fn server_event_context(&self) -> &EventContext {
        &self.server_event_context
    }

    pub fn agent_config(&self) -> Option<&AgentConfig> {
        self.agent_config.as_ref()
    }

    /// Project directory the session was created for.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Why the most recent create or init attempt failed.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

/// What a chat input affordance should offer right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatStatus {
    /// No running session yet.
    Initializing,
    /// A model call is in flight.
    WaitingForAgent,
    /// The agent asked the user something.
    AwaitingUserInput,
    /// The agent is working; input interrupts it.
    Interruptible,
}

impl ChatStatus {
    /// Prompt text for the input field.
    pub fn prompt(&self) -> &'static str {
        match self {
            ChatStatus::Initializing => "Initializing...",
            ChatStatus::WaitingForAgent => "Waiting for agent...",
            ChatStatus::AwaitingUserInput => "Type your message:",
            ChatStatus::Interruptible => "Interrupt:",
        }
    }
}

/// Immutable view of a session handed to consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub(crate) state: SessionState,
    pub(crate) context: SessionContext,
    pub(crate) navigation: CheckpointIndex,
    pub(crate) epoch: u64,
}

impl SessionSnapshot {
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Current attempt; incremented by every reset.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn matches(&self, state: SessionState) -> bool {
        self.state == state
    }

    /// Whether `event` would be accepted by the controller in this state.
    pub fn can(&self, event: &SessionEvent) -> bool {
        machine::accepts(
            self.state,
            &self.context,
            &self.navigation,
            self.epoch,
            event,
        )
    }

    /// Pending checkpoint navigation, if any.
    pub fn navigation_target(&self) -> Option<Checkpoint> {
        self.navigation.target()
    }

    /// Pending navigation target as a position in the display view.
    pub fn navigation_display_target(&self) -> Option<usize> {
        self.navigation
            .display_target(self.context.server_event_context.log())
    }

    /// The session runs and a model call is in flight.
    pub fn awaiting_response(&self) -> bool {
        self.state == SessionState::Running && self.context.server_event_context.model_loading()
    }

    pub fn chat_status(&self) -> ChatStatus {
        let events = &self.context.server_event_context;
        if self.state != SessionState::Running {
            ChatStatus::Initializing
        } else if events.model_loading() {
            ChatStatus::WaitingForAgent
        } else if events.user_request() {
            ChatStatus::AwaitingUserInput
        } else {
            ChatStatus::Interruptible
        }
    }

    /// The consumer should offer directory selection and session creation.
    pub fn needs_project_selection(&self) -> bool {
        !self.can(&SessionEvent::Toggle) && self.state != SessionState::Resetting
    }

    /// Health probing finished, successfully or not.
    pub fn healthcheck_settled(&self) -> bool {
        self.state != SessionState::Setup(SetupPhase::Healthcheck)
    }
}
