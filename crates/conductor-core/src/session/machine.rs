//! The session state machine.
//!
//! [`SessionMachine::handle`] is the transition function: it checks the
//! event's epoch, evaluates the guard for the current state, and only then
//! mutates state and context. It performs no I/O; everything the outside
//! world must do is returned as [`Effect`]s.
//!
//! ```text
//!  setup.healthcheck ──ok──▶ setup.ready ──create──▶ setup.creating
//!     │  ▲  fail (<10)                                   │ ok   │ err
//!     │  └───┘                                           ▼      ▼
//!     │ fail (10)                       setup.created ◀─────  setup.ready
//!     ▼                                   │ init
//!   failed                                ▼
//!                                 setup.initializing ──ok──▶ running ◀─toggle─▶ paused
//!
//!  any state except resetting ──reset──▶ resetting ──resetComplete──▶ setup.healthcheck
//! ```

use crate::checkpoint::CheckpointIndex;
use crate::healthcheck::ProbeOutcome;

use super::event::{Effect, SessionEvent};
use super::state::{SessionContext, SessionSnapshot, SessionState, SetupPhase};

/// Result of offering an event to the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// The event was applied; run these effects.
    Accepted(Vec<Effect>),
    /// The guard did not hold. Nothing changed.
    Rejected,
    /// A follow-up from a superseded attempt. Nothing changed.
    Stale,
}

/// Guard evaluation shared by the machine and snapshots.
pub(crate) fn accepts(
    state: SessionState,
    context: &SessionContext,
    navigation: &CheckpointIndex,
    epoch: u64,
    event: &SessionEvent,
) -> bool {
    if event.epoch().is_some_and(|e| e != epoch) {
        return false;
    }

    match event {
        SessionEvent::Create { path, agent_config } => {
            state == SessionState::Setup(SetupPhase::Ready)
                && !path.trim().is_empty()
                && agent_config.is_complete()
        }
        SessionEvent::CreationComplete { .. } => {
            state == SessionState::Setup(SetupPhase::Creating)
        }
        SessionEvent::Init { agent_config } => {
            state == SessionState::Setup(SetupPhase::Created) && agent_config.is_complete()
        }
        SessionEvent::InitComplete { .. } => {
            state == SessionState::Setup(SetupPhase::Initializing)
        }
        SessionEvent::Toggle => state.is_active(),
        SessionEvent::SendMessage { text } | SessionEvent::Interrupt { text } => {
            state == SessionState::Running && !text.trim().is_empty()
        }
        SessionEvent::ServerEvents { .. } => state.is_active(),
        SessionEvent::HealthcheckResult { .. } => {
            state == SessionState::Setup(SetupPhase::Healthcheck)
        }
        SessionEvent::SelectCheckpoint { index } => {
            CheckpointIndex::can_select(*index, context.server_event_context.log())
        }
        SessionEvent::NavigationComplete => navigation.is_pending(),
        SessionEvent::Reset => state != SessionState::Resetting,
        SessionEvent::ResetComplete { .. } => state == SessionState::Resetting,
    }
}

/// State, context and pending navigation of one session.
#[derive(Debug, Clone)]
pub struct SessionMachine {
    state: SessionState,
    context: SessionContext,
    navigation: CheckpointIndex,
    epoch: u64,
}

impl SessionMachine {
    pub fn new() -> Self {
        Self {
            state: SessionState::default(),
            context: SessionContext::new(0),
            navigation: CheckpointIndex::new(),
            epoch: 0,
        }
    }

    /// Effects to run when the machine is first started.
    pub fn start(&self) -> Vec<Effect> {
        if self.state == SessionState::Setup(SetupPhase::Healthcheck) {
            vec![Effect::ProbeHealth {
                epoch: self.epoch,
                delayed: false,
            }]
        } else {
            Vec::new()
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether `event` would be accepted right now. Has no side effects.
    pub fn can(&self, event: &SessionEvent) -> bool {
        accepts(
            self.state,
            &self.context,
            &self.navigation,
            self.epoch,
            event,
        )
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            context: self.context.clone(),
            navigation: self.navigation.clone(),
            epoch: self.epoch,
        }
    }

    pub fn handle(&mut self, event: SessionEvent) -> Disposition {
        if event.epoch().is_some_and(|e| e != self.epoch) {
            return Disposition::Stale;
        }
        if !self.can(&event) {
            return Disposition::Rejected;
        }
        Disposition::Accepted(self.apply(event))
    }

    /// Apply an event whose guard already holds.
    fn apply(&mut self, event: SessionEvent) -> Vec<Effect> {
        let epoch = self.epoch;
        match event {
            SessionEvent::HealthcheckResult { result: Ok(()), .. } => {
                self.context.healthcheck.record_success();
                self.state = SessionState::Setup(SetupPhase::Ready);
                log::info!("Worker is healthy");
                Vec::new()
            }
            SessionEvent::HealthcheckResult {
                result: Err(err), ..
            } => {
                let outcome = self.context.healthcheck.record_failure();
                if let ProbeOutcome::Exhausted { retries } = outcome {
                    log::error!("Health check abandoned after {} retries: {}", retries, err);
                    self.state = SessionState::Failed;
                    self.context
                        .healthcheck
                        .take_fatal_notice()
                        .map(Effect::RaiseFatalNotice)
                        .into_iter()
                        .collect()
                } else {
                    log::debug!(
                        "Health check failed (retry {}): {}",
                        self.context.healthcheck.retries(),
                        err
                    );
                    vec![Effect::ProbeHealth {
                        epoch,
                        delayed: true,
                    }]
                }
            }
            SessionEvent::Create { path, agent_config } => {
                self.state = SessionState::Setup(SetupPhase::Creating);
                self.context.path = Some(path.clone());
                self.context.agent_config = Some(agent_config.clone());
                self.context.last_error = None;
                vec![Effect::CreateSession {
                    epoch,
                    path,
                    agent_config,
                }]
            }
            SessionEvent::CreationComplete { result, .. } => {
                match result {
                    Ok(()) => self.state = SessionState::Setup(SetupPhase::Created),
                    Err(err) => {
                        log::warn!("Session creation failed: {}", err);
                        self.state = SessionState::Setup(SetupPhase::Ready);
                        self.context.last_error = Some(err.to_string());
                    }
                }
                Vec::new()
            }
            SessionEvent::Init { agent_config } => {
                self.state = SessionState::Setup(SetupPhase::Initializing);
                self.context.agent_config = Some(agent_config.clone());
                self.context.last_error = None;
                vec![Effect::StartSession {
                    epoch,
                    agent_config,
                }]
            }
            SessionEvent::InitComplete { result, .. } => match result {
                Ok(()) => {
                    self.state = SessionState::Running;
                    log::info!("Session running");
                    vec![Effect::StreamEvents { epoch }]
                }
                Err(err) => {
                    log::warn!("Session initialization failed: {}", err);
                    self.state = SessionState::Setup(SetupPhase::Created);
                    self.context.last_error = Some(err.to_string());
                    Vec::new()
                }
            },
            SessionEvent::Toggle => {
                if self.state == SessionState::Running {
                    self.state = SessionState::Paused;
                    vec![Effect::Pause]
                } else {
                    self.state = SessionState::Running;
                    vec![Effect::Resume]
                }
            }
            SessionEvent::SendMessage { text } => vec![Effect::SendMessage { text }],
            SessionEvent::Interrupt { text } => vec![Effect::Interrupt { text }],
            SessionEvent::ServerEvents { events, .. } => {
                for event in &events {
                    self.context.server_event_context.apply(event);
                }
                Vec::new()
            }
            SessionEvent::SelectCheckpoint { index } => {
                self.navigation
                    .select(index, self.context.server_event_context.log());
                Vec::new()
            }
            SessionEvent::NavigationComplete => {
                self.navigation.complete();
                Vec::new()
            }
            SessionEvent::Reset => {
                self.epoch += 1;
                let agent_config = self.context.agent_config.take();
                let path = self.context.path.take();
                self.context = SessionContext::new(self.epoch);
                self.context.agent_config = agent_config;
                self.context.path = path;
                self.navigation = CheckpointIndex::new();
                self.state = SessionState::Resetting;
                log::info!("Resetting session (epoch {})", self.epoch);
                vec![Effect::Teardown { epoch: self.epoch }]
            }
            SessionEvent::ResetComplete { .. } => {
                self.state = SessionState::Setup(SetupPhase::Healthcheck);
                vec![Effect::ProbeHealth {
                    epoch,
                    delayed: false,
                }]
            }
        }
    }
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
