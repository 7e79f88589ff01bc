//! Worker backend boundary.
//!
//! The session controller drives the worker through [`SessionBackend`]. All
//! methods are blocking; the controller runs them off the dispatch path and
//! feeds the results back as events.
//!
//! [`HttpBackend`] talks to the worker's local REST server:
//!
//! ```text
//! GET    {base}/                              readiness probe
//! POST   {base}/sessions/{id}?path=..         create (JSON agent config)
//! PATCH  {base}/sessions/{id}/start           start  (JSON agent config)
//! PATCH  {base}/sessions/{id}/pause|resume
//! POST   {base}/sessions/{id}/response?response=..
//! POST   {base}/sessions/{id}/interrupt?message=..
//! GET    {base}/sessions/{id}/events          full event list
//! DELETE {base}/sessions/{id}                 teardown
//! ```

use std::sync::Mutex;
use std::time::Duration;

use thiserror::Error;

use crate::events::ServerEvent;
use crate::session::{AgentConfig, SessionId};
use crate::sync::lock;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Worker unreachable: {0}")]
    Unreachable(String),

    #[error("Worker rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid response from worker: {0}")]
    InvalidResponse(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<ureq::Error> for BackendError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, response) => BackendError::Rejected {
                status,
                message: response.into_string().unwrap_or_default(),
            },
            ureq::Error::Transport(transport) => BackendError::Unreachable(transport.to_string()),
        }
    }
}

/// Operations the controller needs from the worker process.
pub trait SessionBackend: Send + Sync + 'static {
    /// Succeeds once the worker is ready to accept sessions.
    fn healthcheck(&self) -> Result<(), BackendError>;

    fn create_session(&self, path: &str, config: &AgentConfig) -> Result<(), BackendError>;

    /// Start the agent loop of a created session.
    fn start_session(&self, config: &AgentConfig) -> Result<(), BackendError>;

    fn pause(&self) -> Result<(), BackendError>;

    fn resume(&self) -> Result<(), BackendError>;

    /// Answer the agent.
    fn send_message(&self, text: &str) -> Result<(), BackendError>;

    /// Interrupt the agent with a message.
    fn interrupt(&self, text: &str) -> Result<(), BackendError>;

    /// Events reported since the previous call.
    fn poll_events(&self) -> Result<Vec<ServerEvent>, BackendError>;

    /// Tear the session down. The next poll starts from the beginning.
    fn teardown(&self) -> Result<(), BackendError>;
}

/// [`SessionBackend`] over the worker's HTTP API.
pub struct HttpBackend {
    base_url: String,
    session: SessionId,
    agent: ureq::Agent,
    cursor: Mutex<PollCursor>,
}

/// How far into the worker's event list `poll_events` has read.
///
/// The list belongs to one worker session. `session` changes whenever that
/// session is created or torn down, so a poll whose request was issued
/// before the change can tell that its list is no longer the current one.
#[derive(Debug, Default)]
struct PollCursor {
    session: u64,
    /// Number of events already returned.
    position: usize,
}

impl PollCursor {
    fn restart(&mut self) {
        self.session = self.session.wrapping_add(1);
        self.position = 0;
    }

    /// The part of `all` not returned yet.
    ///
    /// `all` must have been fetched while `fetched_for` was the current
    /// session; a list from a replaced session yields nothing and leaves the
    /// position alone.
    fn advance(&mut self, fetched_for: u64, mut all: Vec<ServerEvent>) -> Vec<ServerEvent> {
        if fetched_for != self.session {
            log::debug!("Dropping {} events polled before a session change", all.len());
            return Vec::new();
        }
        // A shorter list means the worker started over.
        if all.len() < self.position {
            self.position = 0;
        }
        let len = all.len();
        let fresh = all.split_off(self.position);
        self.position = len;
        fresh
    }
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, session: SessionId) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
            agent,
            cursor: Mutex::new(PollCursor::default()),
        }
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    fn session_url(&self, suffix: &str) -> String {
        format!("{}/sessions/{}{}", self.base_url, self.session, suffix)
    }
}

impl SessionBackend for HttpBackend {
    fn healthcheck(&self) -> Result<(), BackendError> {
        self.agent.get(&format!("{}/", self.base_url)).call()?;
        Ok(())
    }

    fn create_session(&self, path: &str, config: &AgentConfig) -> Result<(), BackendError> {
        self.agent
            .post(&self.session_url(""))
            .query("path", path)
            .send_json(config)?;
        lock(&self.cursor).restart();
        Ok(())
    }

    fn start_session(&self, config: &AgentConfig) -> Result<(), BackendError> {
        self.agent
            .request("PATCH", &self.session_url("/start"))
            .send_json(config)?;
        Ok(())
    }

    fn pause(&self) -> Result<(), BackendError> {
        self.agent
            .request("PATCH", &self.session_url("/pause"))
            .call()?;
        Ok(())
    }

    fn resume(&self) -> Result<(), BackendError> {
        self.agent
            .request("PATCH", &self.session_url("/resume"))
            .call()?;
        Ok(())
    }

    fn send_message(&self, text: &str) -> Result<(), BackendError> {
        self.agent
            .post(&self.session_url("/response"))
            .query("response", text)
            .call()?;
        Ok(())
    }

    fn interrupt(&self, text: &str) -> Result<(), BackendError> {
        self.agent
            .post(&self.session_url("/interrupt"))
            .query("message", text)
            .call()?;
        Ok(())
    }

    fn poll_events(&self) -> Result<Vec<ServerEvent>, BackendError> {
        let fetched_for = lock(&self.cursor).session;
        let response = self.agent.get(&self.session_url("/events")).call()?;
        let body: serde_json::Value = response
            .into_json()
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        let all = parse_events(body)?;
        Ok(lock(&self.cursor).advance(fetched_for, all))
    }

    fn teardown(&self) -> Result<(), BackendError> {
        lock(&self.cursor).restart();
        self.agent.delete(&self.session_url("")).call()?;
        Ok(())
    }
}

/// Parse the worker's event list. Entries that do not parse become `Unknown`.
fn parse_events(body: serde_json::Value) -> Result<Vec<ServerEvent>, BackendError> {
    let serde_json::Value::Array(items) = body else {
        return Err(BackendError::InvalidResponse(
            "expected a JSON array of events".to_string(),
        ));
    };

    let mut events = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<ServerEvent>(item) {
            Ok(event) => events.push(event),
            Err(e) => {
                log::warn!("Skipping malformed worker event: {}", e);
                events.push(ServerEvent::Unknown);
            }
        }
    }
    Ok(events)
}
