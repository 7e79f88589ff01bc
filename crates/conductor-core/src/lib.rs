//! # conductor-core
//!
//! Session lifecycle controller for a long-running agent worker.
//!
//! The worker is a separate process that runs an autonomous coding agent and
//! exposes it over a local HTTP API. This crate owns everything between that
//! API and a user interface:
//!
//! - **Session**: a state machine driving the worker from health probing
//!   through creation and initialization to running/paused, with reset
//! - **Events**: folds the worker's raw event stream into an ordered
//!   transcript of [`Message`]s plus status flags
//! - **Checkpoints**: navigation targets addressed by message index
//! - **Subscriptions**: equality-filtered change notification for views
//!
//! ## Architecture
//!
//! ```text
//!   UI / daemon ──send──▶ SessionController ──effects──▶ SessionBackend ──▶ worker
//!        ▲                      │  ▲                          │
//!        └──── subscribers ◀────┘  └──── follow-up events ◀───┘
//! ```

pub mod backend;
pub mod checkpoint;
pub mod config;
pub mod credentials;
pub mod events;
pub mod healthcheck;
pub mod logging;
pub mod onboarding;
pub mod session;
pub mod subscription;
mod sync;

// Re-export commonly used types
pub use backend::{BackendError, HttpBackend, SessionBackend};
pub use config::ControllerConfig;
pub use events::{Message, MessageKind, ServerEvent};
pub use session::{
    AgentConfig, SessionController, SessionEvent, SessionId, SessionSnapshot, SessionState,
    SetupPhase,
};
