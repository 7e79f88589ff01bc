//! Session lifecycle: state machine, controller and the views handed to consumers.
//!
//! [`SessionMachine`] is the pure transition table. [`SessionController`]
//! owns one machine, serializes events into it and runs the effects it
//! requests against a [`SessionBackend`](crate::backend::SessionBackend).

mod controller;
mod event;
mod machine;
mod state;

pub use controller::{
    ControllerError, FatalNoticeHandler, SessionController, SessionControllerBuilder,
};
pub use event::{Effect, SessionEvent};
pub use machine::{Disposition, SessionMachine};
pub use state::{
    AgentConfig, ChatStatus, SessionContext, SessionId, SessionSnapshot, SessionState, SetupPhase,
};
