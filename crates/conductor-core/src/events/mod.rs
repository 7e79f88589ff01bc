//! Event stream aggregation.
//!
//! The worker reports its activity as [`ServerEvent`]s. The session
//! controller folds them into an [`EventContext`], whose [`MessageLog`] is the
//! single source of truth for transcript display and checkpoint navigation.

mod context;
mod message;
mod message_log;
mod server;

pub use context::EventContext;
pub use message::{Message, MessageKind};
pub use message_log::{LogVersion, MessageLog};
pub use server::ServerEvent;
