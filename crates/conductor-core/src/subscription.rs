//! Equality-filtered subscriber registry.
//!
//! Each subscriber projects the published state down to the part it cares
//! about and is only called back when that projection changes. A view that
//! tracks the lifecycle state is therefore not woken by transcript appends,
//! and vice versa.
//!
//! # Example
//!
//! ```rust
//! use conductor_core::subscription::SubscriberRegistry;
//! use std::sync::{Arc, Mutex};
//!
//! let mut registry = SubscriberRegistry::new();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//!
//! registry.select(&(1, "a"), |s: &(i32, &str)| s.0, move |n: &i32| sink.lock().unwrap().push(*n));
//!
//! registry.publish(&(1, "b")); // projection unchanged, no callback
//! registry.publish(&(2, "b"));
//! assert_eq!(*seen.lock().unwrap(), vec![2]);
//! ```

use std::panic::{self, AssertUnwindSafe};

use uuid::Uuid;

/// Unique identifier for a registered subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub String);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

trait Subscriber<S>: Send {
    /// Recompute the projection and call back if it changed.
    fn observe(&mut self, state: &S) -> bool;
}

struct Selector<T, P, E, F> {
    project: P,
    equals: E,
    on_change: F,
    last: T,
}

impl<S, T, P, E, F> Subscriber<S> for Selector<T, P, E, F>
where
    T: Send,
    P: Fn(&S) -> T + Send,
    E: Fn(&T, &T) -> bool + Send,
    F: FnMut(&T) + Send,
{
    fn observe(&mut self, state: &S) -> bool {
        let next = (self.project)(state);
        if (self.equals)(&self.last, &next) {
            return false;
        }
        self.last = next;
        (self.on_change)(&self.last);
        true
    }
}

/// Registry of subscribers to a published state of type `S`.
pub struct SubscriberRegistry<S> {
    entries: Vec<(SubscriberId, Box<dyn Subscriber<S>>)>,
}

impl<S: 'static> SubscriberRegistry<S> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Subscribe to the whole state, compared by value.
    pub fn subscribe<F>(&mut self, current: &S, on_change: F) -> SubscriberId
    where
        S: Clone + PartialEq + Send,
        F: FnMut(&S) + Send + 'static,
    {
        self.select(current, S::clone, on_change)
    }

    /// Subscribe to a projection of the state, compared by value.
    pub fn select<T, P, F>(&mut self, current: &S, project: P, on_change: F) -> SubscriberId
    where
        T: PartialEq + Send + 'static,
        P: Fn(&S) -> T + Send + 'static,
        F: FnMut(&T) + Send + 'static,
    {
        self.select_with(current, project, <T as PartialEq>::eq, on_change)
    }

    /// Subscribe to a projection of the state with a custom equality.
    ///
    /// `current` is the state at registration time; its projection becomes
    /// the baseline, so the first callback only fires on a later change.
    pub fn select_with<T, P, E, F>(
        &mut self,
        current: &S,
        project: P,
        equals: E,
        on_change: F,
    ) -> SubscriberId
    where
        T: Send + 'static,
        P: Fn(&S) -> T + Send + 'static,
        E: Fn(&T, &T) -> bool + Send + 'static,
        F: FnMut(&T) + Send + 'static,
    {
        let id = SubscriberId::new();
        let last = project(current);
        self.entries.push((
            id.clone(),
            Box::new(Selector {
                project,
                equals,
                on_change,
                last,
            }),
        ));
        id
    }

    /// Remove a subscriber. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: &SubscriberId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| entry_id != id);
        self.entries.len() != before
    }

    /// Offer a new state to every subscriber, in registration order.
    ///
    /// A subscriber that panics is logged and skipped; the rest are still
    /// called. Returns the number of subscribers that were called back.
    pub fn publish(&mut self, state: &S) -> usize {
        let mut delivered = 0;
        for (id, subscriber) in &mut self.entries {
            match panic::catch_unwind(AssertUnwindSafe(|| subscriber.observe(state))) {
                Ok(true) => delivered += 1,
                Ok(false) => {}
                Err(_) => log::error!("Subscriber {} panicked", id),
            }
        }
        delivered
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: 'static> Default for SubscriberRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    struct State {
        tag: &'static str,
        items: Vec<u32>,
    }

    fn state(tag: &'static str, items: &[u32]) -> State {
        State {
            tag,
            items: items.to_vec(),
        }
    }

    fn recorder<T: Clone + Send + 'static>(
    ) -> (Arc<Mutex<Vec<T>>>, impl FnMut(&T) + Send + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |value: &T| sink.lock().unwrap().push(value.clone()))
    }

    mod subscriber_id {
        use super::*;

        #[test]
        fn new_generates_unique_ids() {
            assert_ne!(SubscriberId::new(), SubscriberId::new());
        }

        #[test]
        fn display_shows_inner_string() {
            let id = SubscriberId("sub-1".to_string());
            assert_eq!(id.to_string(), "sub-1");
        }
    }

    mod delivery {
        use super::*;

        #[test]
        fn registration_does_not_call_back() {
            let mut registry = SubscriberRegistry::new();
            let (seen, on_change) = recorder::<State>();

            registry.subscribe(&state("a", &[]), on_change);

            assert!(seen.lock().unwrap().is_empty());
        }

        #[test]
        fn whole_state_subscriber_sees_every_change() {
            let mut registry = SubscriberRegistry::new();
            let (seen, on_change) = recorder::<State>();
            registry.subscribe(&state("a", &[]), on_change);

            registry.publish(&state("a", &[1]));
            registry.publish(&state("b", &[1]));

            assert_eq!(
                *seen.lock().unwrap(),
                vec![state("a", &[1]), state("b", &[1])]
            );
        }

        #[test]
        fn equal_state_is_not_delivered() {
            let mut registry = SubscriberRegistry::new();
            let (seen, on_change) = recorder::<State>();
            registry.subscribe(&state("a", &[1]), on_change);

            assert_eq!(registry.publish(&state("a", &[1])), 0);
            assert!(seen.lock().unwrap().is_empty());
        }

        #[test]
        fn projection_isolates_unrelated_changes() {
            let mut registry = SubscriberRegistry::new();
            let (tags, on_tag) = recorder::<&'static str>();
            let (lengths, on_len) = recorder::<usize>();
            let initial = state("a", &[]);
            registry.select(&initial, |s: &State| s.tag, on_tag);
            registry.select(&initial, |s: &State| s.items.len(), on_len);

            assert_eq!(registry.publish(&state("a", &[1])), 1);
            assert_eq!(registry.publish(&state("a", &[1, 2])), 1);
            assert_eq!(registry.publish(&state("b", &[1, 2])), 1);

            assert_eq!(*tags.lock().unwrap(), vec!["b"]);
            assert_eq!(*lengths.lock().unwrap(), vec![1, 2]);
        }

        #[test]
        fn custom_equality_controls_delivery() {
            let mut registry = SubscriberRegistry::new();
            let (seen, on_change) = recorder::<Vec<u32>>();
            // Only care about growth past multiples of ten.
            registry.select_with(
                &state("a", &[]),
                |s: &State| s.items.clone(),
                |a: &Vec<u32>, b: &Vec<u32>| a.len() / 10 == b.len() / 10,
                on_change,
            );

            registry.publish(&state("a", &[0; 9]));
            registry.publish(&state("a", &[0; 10]));
            registry.publish(&state("a", &[0; 11]));

            assert_eq!(seen.lock().unwrap().len(), 1);
            assert_eq!(seen.lock().unwrap()[0].len(), 10);
        }

        #[test]
        fn baseline_follows_last_delivered_value() {
            let mut registry = SubscriberRegistry::new();
            let (seen, on_change) = recorder::<&'static str>();
            registry.select(&state("a", &[]), |s: &State| s.tag, on_change);

            registry.publish(&state("b", &[]));
            registry.publish(&state("b", &[]));
            registry.publish(&state("a", &[]));

            assert_eq!(*seen.lock().unwrap(), vec!["b", "a"]);
        }

        #[test]
        fn panicking_subscriber_does_not_block_others() {
            let mut registry = SubscriberRegistry::new();
            let calls = Arc::new(Mutex::new(0));
            let counter = Arc::clone(&calls);
            registry.select(&state("a", &[]), |s: &State| s.tag, move |_: &&str| {
                *counter.lock().unwrap() += 1;
                panic!("view crashed");
            });
            let (seen, on_change) = recorder::<&'static str>();
            registry.select(&state("a", &[]), |s: &State| s.tag, on_change);

            assert_eq!(registry.publish(&state("b", &[])), 1);
            assert_eq!(registry.publish(&state("b", &[])), 0);
            assert_eq!(registry.publish(&state("c", &[])), 1);

            assert_eq!(*seen.lock().unwrap(), vec!["b", "c"]);
            assert_eq!(*calls.lock().unwrap(), 2);
            assert_eq!(registry.len(), 2);
        }
    }

    mod registry {
        use super::*;

        #[test]
        fn new_is_empty() {
            let registry: SubscriberRegistry<State> = SubscriberRegistry::new();
            assert!(registry.is_empty());
            assert_eq!(registry.len(), 0);
        }

        #[test]
        fn unsubscribe_stops_delivery() {
            let mut registry = SubscriberRegistry::new();
            let (seen, on_change) = recorder::<State>();
            let id = registry.subscribe(&state("a", &[]), on_change);

            assert!(registry.unsubscribe(&id));
            registry.publish(&state("b", &[]));

            assert!(seen.lock().unwrap().is_empty());
            assert!(registry.is_empty());
        }

        #[test]
        fn unsubscribe_unknown_returns_false() {
            let mut registry: SubscriberRegistry<State> = SubscriberRegistry::new();
            assert!(!registry.unsubscribe(&SubscriberId("missing".to_string())));
        }
    }
}
