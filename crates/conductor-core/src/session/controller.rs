//! SessionController - the single owner of a session's state.
//!
//! All events pass through one acceptance point. Callers push into an inbox;
//! whoever holds the dispatch lock drains it, one event at a time, through
//! the [`SessionMachine`]. Accepted events are written to the transition
//! log, published to subscribers, and their effects are started on the
//! tokio runtime. Effects report back by sending follow-up events tagged
//! with the epoch they were started in.
//!
//! ```text
//!   send(event) ──▶ inbox ──▶ [dispatch lock] ──▶ SessionMachine::handle
//!                     ▲                                 │ accepted
//!                     │                                 ├──▶ transition log
//!                     │                                 ├──▶ subscribers
//!                     │                                 └──▶ effects (tokio)
//!                     └────────── follow-up events ◀────────────┘
//! ```

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, TryLockError};
use std::time::Duration;

use thiserror::Error;
use tokio::runtime::Handle;

use crate::backend::{BackendError, SessionBackend};
use crate::config::ControllerConfig;
use crate::healthcheck::FatalNotice;
use crate::logging::{log_line, open_log_file, LogHandle};
use crate::subscription::{SubscriberId, SubscriberRegistry};
use crate::sync::lock;

use super::event::{Effect, SessionEvent};
use super::machine::{Disposition, SessionMachine};
use super::state::{SessionSnapshot, SessionState};

/// Callback invoked once per exhausted health-check attempt.
pub type FatalNoticeHandler = Arc<dyn Fn(&FatalNotice) + Send + Sync>;

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Session controller must be built inside a tokio runtime or given a runtime handle")]
    NoRuntime,
}

/// Builder for [`SessionController`].
pub struct SessionControllerBuilder {
    backend: Arc<dyn SessionBackend>,
    config: ControllerConfig,
    log_dir: Option<PathBuf>,
    on_fatal_notice: Option<FatalNoticeHandler>,
    runtime: Option<Handle>,
}

impl SessionControllerBuilder {
    pub fn new(backend: Arc<dyn SessionBackend>) -> Self {
        Self {
            backend,
            config: ControllerConfig::default(),
            log_dir: None,
            on_fatal_notice: None,
            runtime: None,
        }
    }

    pub fn config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    /// Write the transition log under `dir`. Overrides `config.log_dir`.
    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Show the fatal health-check notice to the user.
    pub fn on_fatal_notice<F>(mut self, handler: F) -> Self
    where
        F: Fn(&FatalNotice) + Send + Sync + 'static,
    {
        self.on_fatal_notice = Some(Arc::new(handler));
        self
    }

    /// Run effects on `handle` instead of the current runtime.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Build the controller and start health probing.
    pub fn build(self) -> Result<SessionController, ControllerError> {
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| ControllerError::NoRuntime)?,
        };

        let mut config = self.config;
        if let Some(dir) = self.log_dir {
            config.log_dir = Some(dir);
        }
        let transition_log = open_log_file(config.log_dir.as_deref(), &config.log_id);

        let machine = SessionMachine::new();
        let initial = machine.start();
        log_line(&transition_log, "session.start", machine.state().path());

        let inner = Arc::new(Inner {
            machine: Mutex::new(machine),
            inbox: Mutex::new(VecDeque::new()),
            dispatch: Mutex::new(()),
            subscribers: Mutex::new(SubscriberRegistry::new()),
            backend: self.backend,
            runtime,
            config,
            transition_log,
            on_fatal_notice: self.on_fatal_notice,
        });

        for effect in initial {
            inner.run(effect);
        }

        Ok(SessionController { inner })
    }
}

/// Handle to a running session. Cheap to clone; all clones share one session.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    pub fn builder(backend: Arc<dyn SessionBackend>) -> SessionControllerBuilder {
        SessionControllerBuilder::new(backend)
    }

    /// Offer an event. Disallowed and stale events are dropped silently.
    ///
    /// Safe to call from subscriber callbacks; the event is processed after
    /// the one currently being dispatched.
    pub fn send(&self, event: SessionEvent) {
        self.inner.send(event);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        lock(&self.inner.machine).snapshot()
    }

    pub fn state(&self) -> SessionState {
        lock(&self.inner.machine).state()
    }

    /// Whether `event` would be accepted right now.
    pub fn can(&self, event: &SessionEvent) -> bool {
        lock(&self.inner.machine).can(event)
    }

    /// Called back whenever the snapshot changes.
    ///
    /// Callbacks run on the dispatching thread. They may call `send` but must
    /// not subscribe or unsubscribe.
    pub fn subscribe<F>(&self, on_change: F) -> SubscriberId
    where
        F: FnMut(&SessionSnapshot) + Send + 'static,
    {
        let mut subscribers = lock(&self.inner.subscribers);
        let current = self.snapshot();
        subscribers.subscribe(&current, on_change)
    }

    /// Called back whenever `project(snapshot)` changes.
    pub fn select<T, P, F>(&self, project: P, on_change: F) -> SubscriberId
    where
        T: PartialEq + Send + 'static,
        P: Fn(&SessionSnapshot) -> T + Send + 'static,
        F: FnMut(&T) + Send + 'static,
    {
        let mut subscribers = lock(&self.inner.subscribers);
        let current = self.snapshot();
        subscribers.select(&current, project, on_change)
    }

    /// Like [`select`](Self::select) with a custom equality.
    pub fn select_with<T, P, E, F>(&self, project: P, equals: E, on_change: F) -> SubscriberId
    where
        T: Send + 'static,
        P: Fn(&SessionSnapshot) -> T + Send + 'static,
        E: Fn(&T, &T) -> bool + Send + 'static,
        F: FnMut(&T) + Send + 'static,
    {
        let mut subscribers = lock(&self.inner.subscribers);
        let current = self.snapshot();
        subscribers.select_with(&current, project, equals, on_change)
    }

    pub fn unsubscribe(&self, id: &SubscriberId) -> bool {
        lock(&self.inner.subscribers).unsubscribe(id)
    }
}

struct Inner {
    machine: Mutex<SessionMachine>,
    inbox: Mutex<VecDeque<SessionEvent>>,
    /// Held by the thread draining the inbox.
    dispatch: Mutex<()>,
    subscribers: Mutex<SubscriberRegistry<SessionSnapshot>>,
    backend: Arc<dyn SessionBackend>,
    runtime: Handle,
    config: ControllerConfig,
    transition_log: LogHandle,
    on_fatal_notice: Option<FatalNoticeHandler>,
}

impl Inner {
    fn send(self: &Arc<Self>, event: SessionEvent) {
        lock(&self.inbox).push_back(event);
        self.drain();
    }

    fn drain(self: &Arc<Self>) {
        loop {
            let guard = match self.dispatch.try_lock() {
                Ok(guard) => guard,
                // The holder drains what we just queued.
                Err(TryLockError::WouldBlock) => return,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            };

            loop {
                let next = lock(&self.inbox).pop_front();
                match next {
                    Some(event) => self.process(event),
                    None => break,
                }
            }
            drop(guard);

            // An event may have been queued between the last pop and the unlock.
            if lock(&self.inbox).is_empty() {
                return;
            }
        }
    }

    fn process(self: &Arc<Self>, event: SessionEvent) {
        let name = event.name();

        let mut machine = lock(&self.machine);
        let from = machine.state();
        let effects = match machine.handle(event) {
            Disposition::Accepted(effects) => effects,
            Disposition::Rejected => {
                log::debug!("Ignoring {} in state {}", name, from);
                return;
            }
            Disposition::Stale => {
                log::debug!("Discarding stale {}", name);
                return;
            }
        };
        let snapshot = machine.snapshot();
        log_line(
            &self.transition_log,
            name,
            &format!("{} -> {}", from, snapshot.state()),
        );
        drop(machine);

        for effect in effects {
            self.run(effect);
        }

        lock(&self.subscribers).publish(&snapshot);
    }

    fn run(self: &Arc<Self>, effect: Effect) {
        match effect {
            Effect::ProbeHealth { epoch, delayed } => {
                let delay = delayed.then_some(self.config.healthcheck_interval);
                self.spawn_call(
                    delay,
                    |backend| backend.healthcheck(),
                    move |result| Some(SessionEvent::HealthcheckResult { epoch, result }),
                );
            }
            Effect::CreateSession {
                epoch,
                path,
                agent_config,
            } => {
                self.spawn_call(
                    None,
                    move |backend| backend.create_session(&path, &agent_config),
                    move |result| Some(SessionEvent::CreationComplete { epoch, result }),
                );
            }
            Effect::StartSession {
                epoch,
                agent_config,
            } => {
                self.spawn_call(
                    None,
                    move |backend| backend.start_session(&agent_config),
                    move |result| Some(SessionEvent::InitComplete { epoch, result }),
                );
            }
            Effect::Pause => self.spawn_command("pause", |backend| backend.pause()),
            Effect::Resume => self.spawn_command("resume", |backend| backend.resume()),
            Effect::SendMessage { text } => {
                self.spawn_command("send message", move |backend| backend.send_message(&text))
            }
            Effect::Interrupt { text } => {
                self.spawn_command("interrupt", move |backend| backend.interrupt(&text))
            }
            Effect::StreamEvents { epoch } => self.spawn_stream(epoch),
            Effect::Teardown { epoch } => {
                self.spawn_call(
                    None,
                    |backend| backend.teardown(),
                    move |result| {
                        if let Err(e) = result {
                            log::warn!("Teardown failed, continuing reset: {}", e);
                        }
                        Some(SessionEvent::ResetComplete { epoch })
                    },
                );
            }
            Effect::RaiseFatalNotice(notice) => {
                log::error!("{}", notice);
                log_line(&self.transition_log, "FATAL", &notice.to_string());
                if let Some(handler) = &self.on_fatal_notice {
                    handler(&notice);
                }
            }
        }
    }

    /// Run a blocking backend call, then send the follow-up it maps to.
    fn spawn_call<C, F>(self: &Arc<Self>, delay: Option<Duration>, call: C, follow_up: F)
    where
        C: FnOnce(&dyn SessionBackend) -> Result<(), BackendError> + Send + 'static,
        F: FnOnce(Result<(), BackendError>) -> Option<SessionEvent> + Send + 'static,
    {
        let weak = Arc::downgrade(self);
        let backend = Arc::clone(&self.backend);
        self.runtime.spawn(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if weak.strong_count() == 0 {
                return;
            }

            let result = tokio::task::spawn_blocking(move || call(backend.as_ref()))
                .await
                .unwrap_or_else(|e| Err(BackendError::Task(e.to_string())));

            if let (Some(inner), Some(event)) = (weak.upgrade(), follow_up(result)) {
                inner.send(event);
            }
        });
    }

    /// Run a blocking backend call whose failure is only logged.
    fn spawn_command<C>(self: &Arc<Self>, operation: &'static str, call: C)
    where
        C: FnOnce(&dyn SessionBackend) -> Result<(), BackendError> + Send + 'static,
    {
        self.spawn_call(None, call, move |result| {
            if let Err(e) = result {
                log::warn!("Worker {} failed: {}", operation, e);
            }
            None
        });
    }

    fn spawn_stream(self: &Arc<Self>, epoch: u64) {
        let weak = Arc::downgrade(self);
        let interval = self.config.event_poll_interval;
        self.runtime.spawn(async move {
            loop {
                tokio::time::sleep(interval).await;

                let backend = match weak.upgrade() {
                    Some(inner) if inner.is_streaming(epoch) => Arc::clone(&inner.backend),
                    _ => break,
                };
                let polled = tokio::task::spawn_blocking(move || backend.poll_events())
                    .await
                    .unwrap_or_else(|e| Err(BackendError::Task(e.to_string())));

                let Some(inner) = weak.upgrade() else {
                    break;
                };
                match polled {
                    Ok(events) if events.is_empty() => {}
                    Ok(events) => inner.send(SessionEvent::ServerEvents { epoch, events }),
                    Err(e) => log::warn!("Event poll failed: {}", e),
                }
            }
            log::debug!("Event stream for epoch {} stopped", epoch);
        });
    }

    fn is_streaming(&self, epoch: u64) -> bool {
        let machine = lock(&self.machine);
        machine.epoch() == epoch && machine.state().is_active()
    }
}

// ============================================================================
// TESTS
// ============================================================================
