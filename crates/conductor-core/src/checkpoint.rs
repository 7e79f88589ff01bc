//! Checkpoint navigation.
//!
//! A consumer (typically a timeline view) selects a checkpoint, another
//! consumer (the transcript view) scrolls to it and reports completion. The
//! selection is request state only; it never touches the message log.

use crate::events::MessageLog;

/// A navigable reference to a message in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checkpoint {
    pub index: usize,
}

/// Holds at most one pending navigation request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckpointIndex {
    selected: Option<Checkpoint>,
}

impl CheckpointIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `index` refers to an existing message.
    pub fn can_select(index: usize, log: &MessageLog) -> bool {
        index < log.len()
    }

    /// Request navigation to the message at `index`.
    ///
    /// Out-of-range indices are ignored. Returns whether the request was
    /// recorded.
    pub fn select(&mut self, index: usize, log: &MessageLog) -> bool {
        if !Self::can_select(index, log) {
            return false;
        }
        self.selected = Some(Checkpoint { index });
        true
    }

    /// The pending navigation target, if any.
    pub fn target(&self) -> Option<Checkpoint> {
        self.selected
    }

    /// Where the pending target sits in the display view of `log`.
    pub fn display_target(&self, log: &MessageLog) -> Option<usize> {
        self.selected
            .and_then(|checkpoint| log.display_position(checkpoint.index))
    }

    /// Mark the pending navigation as done and clear it.
    ///
    /// Returns the checkpoint that was pending, so the same one can be
    /// selected again later.
    pub fn complete(&mut self) -> Option<Checkpoint> {
        self.selected.take()
    }

    pub fn is_pending(&self) -> bool {
        self.selected.is_some()
    }
}
