//! Append-only message log with a cached display view.

use std::sync::Arc;

use super::message::{Message, MessageKind};

/// Memoization key for views derived from a [`MessageLog`].
///
/// Messages never change after they are appended, so the length of the log
/// identifies its content within one generation. The generation changes when
/// a reset replaces the log, which keeps a post-reset log of the same length
/// from matching a stale cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LogVersion {
    pub generation: u64,
    pub len: usize,
}

/// The authoritative, ordered transcript of one session run.
///
/// Index `i` always holds the message whose `index()` is `i`.
///
/// Cloning is O(1): clones share the message buffer until one of them is
/// appended to, and even then only the entries are copied, never the text.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Arc<Vec<Message>>,
    /// Number of leading entries hidden from the display view.
    display_start: usize,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message and return the index it was assigned.
    pub(crate) fn push(&mut self, kind: MessageKind, text: impl Into<String>) -> usize {
        let index = self.messages.len();
        Arc::make_mut(&mut self.messages).push(Message::new(index, kind, text.into()));
        if index == 1 {
            self.display_start = leading_pair_len(&self.messages);
        }
        index
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Message> {
        self.messages.get(index)
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Every message, including those hidden from the display view.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    /// The transcript as presented to the user.
    ///
    /// When the run opens with a `task` immediately followed by a `thought`,
    /// those two entries are left out. They stay in [`Self::messages`].
    pub fn display(&self) -> &[Message] {
        &self.messages[self.display_start..]
    }

    /// Index of the first message in the display view.
    pub fn display_start(&self) -> usize {
        self.display_start
    }

    /// Position of `index` within the display view.
    ///
    /// Hidden leading entries map to the top of the view. Returns `None` for
    /// indices past the end of the log.
    pub fn display_position(&self, index: usize) -> Option<usize> {
        (index < self.messages.len()).then(|| index.saturating_sub(self.display_start))
    }

    /// The display view may still lose its first entry.
    ///
    /// True while the log holds only a leading `task`: if the next message is
    /// a `thought`, both are hidden. Incremental consumers should hold the
    /// task back until this turns false.
    pub fn is_display_provisional(&self) -> bool {
        matches!(&self.messages[..], [only] if only.kind() == MessageKind::Task)
    }

    /// Both logs share the same message buffer.
    pub fn shares_storage(&self, other: &MessageLog) -> bool {
        Arc::ptr_eq(&self.messages, &other.messages)
    }
}

impl PartialEq for MessageLog {
    fn eq(&self, other: &Self) -> bool {
        self.display_start == other.display_start
            && (self.shares_storage(other) || self.messages == other.messages)
    }
}

impl Eq for MessageLog {}

impl<'a> IntoIterator for &'a MessageLog {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

fn leading_pair_len(messages: &[Message]) -> usize {
    match messages {
        [first, second, ..]
            if first.kind() == MessageKind::Task && second.kind() == MessageKind::Thought =>
        {
            2
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(messages: &[Message]) -> Vec<MessageKind> {
        messages.iter().map(Message::kind).collect()
    }

    mod push {
        use super::*;

        #[test]
        fn assigns_contiguous_indices_from_zero() {
            let mut log = MessageLog::new();
            let kinds = [
                MessageKind::Task,
                MessageKind::Thought,
                MessageKind::Command,
                MessageKind::Tool,
                MessageKind::Agent,
                MessageKind::User,
            ];
            for kind in kinds {
                log.push(kind, "x");
            }

            for (position, message) in log.iter().enumerate() {
                assert_eq!(message.index(), position);
            }
            assert_eq!(log.len(), kinds.len());
        }

        #[test]
        fn returns_assigned_index() {
            let mut log = MessageLog::new();
            assert_eq!(log.push(MessageKind::User, "hi"), 0);
            assert_eq!(log.push(MessageKind::Agent, "hello"), 1);
            assert_eq!(log.get(1).map(Message::text), Some("hello"));
        }
    }

    mod display {
        use super::*;

        #[test]
        fn elides_leading_task_thought_pair() {
            let mut log = MessageLog::new();
            log.push(MessageKind::Task, "fix the bug");
            log.push(MessageKind::Thought, "looking at the code");
            log.push(MessageKind::Agent, "found it");

            assert_eq!(log.len(), 3);
            assert_eq!(kinds(log.display()), vec![MessageKind::Agent]);
            assert_eq!(log.display()[0].index(), 2);
        }

        #[test]
        fn keeps_single_task() {
            let mut log = MessageLog::new();
            log.push(MessageKind::Task, "fix the bug");

            assert_eq!(kinds(log.display()), vec![MessageKind::Task]);
        }

        #[test]
        fn keeps_pair_in_other_order() {
            let mut log = MessageLog::new();
            log.push(MessageKind::Thought, "hmm");
            log.push(MessageKind::Task, "fix the bug");

            assert_eq!(log.display().len(), 2);
        }

        #[test]
        fn only_considers_first_two_entries() {
            let mut log = MessageLog::new();
            log.push(MessageKind::Agent, "hi");
            log.push(MessageKind::Task, "fix the bug");
            log.push(MessageKind::Thought, "hmm");

            assert_eq!(log.display().len(), 3);
        }

        #[test]
        fn empty_log_has_empty_view() {
            let log = MessageLog::new();
            assert!(log.display().is_empty());
        }

        #[test]
        fn display_position_maps_hidden_entries_to_top() {
            let mut log = MessageLog::new();
            log.push(MessageKind::Task, "t");
            log.push(MessageKind::Thought, "th");
            log.push(MessageKind::Agent, "a");
            log.push(MessageKind::Tool, "out");

            assert_eq!(log.display_position(0), Some(0));
            assert_eq!(log.display_position(1), Some(0));
            assert_eq!(log.display_position(3), Some(1));
            assert_eq!(log.display_position(4), None);
        }

        #[test]
        fn lone_task_is_provisional() {
            let mut log = MessageLog::new();
            assert!(!log.is_display_provisional());

            log.push(MessageKind::Task, "fix the bug");
            assert!(log.is_display_provisional());

            log.push(MessageKind::Thought, "hmm");
            assert!(!log.is_display_provisional());
            assert!(log.display().is_empty());
        }

        #[test]
        fn lone_non_task_is_settled() {
            let mut log = MessageLog::new();
            log.push(MessageKind::Agent, "hi");

            assert!(!log.is_display_provisional());
        }
    }

    mod clone {
        use super::*;

        fn long_log(entries: usize) -> MessageLog {
            let mut log = MessageLog::new();
            for _ in 0..entries {
                log.push(MessageKind::Tool, "x".repeat(1024));
            }
            log
        }

        #[test]
        fn clones_share_the_buffer() {
            let log = long_log(200);
            let copy = log.clone();

            assert!(log.shares_storage(&copy));
            assert!(std::ptr::eq(log.messages().as_ptr(), copy.messages().as_ptr()));
            assert_eq!(log, copy);
        }

        #[test]
        fn append_after_clone_leaves_copy_untouched() {
            let mut log = long_log(3);
            let copy = log.clone();

            log.push(MessageKind::Agent, "done");

            assert!(!log.shares_storage(&copy));
            assert_eq!(copy.len(), 3);
            assert_eq!(log.len(), 4);
            assert_ne!(log, copy);
            for (old, new) in copy.iter().zip(log.iter()) {
                assert!(std::ptr::eq(old.text(), new.text()));
            }
        }
    }
}
