//! The notification bus: synchronous fan-out of state-changed and
//! invalid-transition notifications.
//!
//! Both notification kinds support any number of subscribers. Delivery is
//! synchronous and in insertion order. Publication snapshots the subscriber
//! list before invoking anybody, so a callback may subscribe or unsubscribe
//! without corrupting the iteration; subscribers added during a publication
//! first hear the next notification.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::args::Args;

/// Callback for state-changed notifications: the entered state and the
/// triggering call's forwarded arguments.
pub type StateChangeFn = dyn Fn(&str, &Args) + Send + Sync;

/// Callback for invalid-transition notifications: the rejected event and the
/// state the machine was in.
pub type InvalidTransitionFn = dyn Fn(&str, &str) + Send + Sync;

/// Identifies one subscription for later removal.
///
/// Ids are unique across both notification kinds of one machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub(crate) struct NotificationBus {
    state_changed: Mutex<Vec<(SubscriptionId, Arc<StateChangeFn>)>>,
    invalid_transition: Mutex<Vec<(SubscriptionId, Arc<InvalidTransitionFn>)>>,
    next_id: AtomicU64,
}

impl NotificationBus {
    pub(crate) fn new() -> Self {
        Self {
            state_changed: Mutex::new(Vec::new()),
            invalid_transition: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    fn mint_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Acquire the state-changed list, recovering from poison if necessary.
    fn lock_state_changed(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Arc<StateChangeFn>)>> {
        self.state_changed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_invalid_transition(
        &self,
    ) -> MutexGuard<'_, Vec<(SubscriptionId, Arc<InvalidTransitionFn>)>> {
        self.invalid_transition
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn subscribe_state_change(&self, f: Arc<StateChangeFn>) -> SubscriptionId {
        let id = self.mint_id();
        self.lock_state_changed().push((id, f));
        id
    }

    pub(crate) fn subscribe_invalid_transition(
        &self,
        f: Arc<InvalidTransitionFn>,
    ) -> SubscriptionId {
        let id = self.mint_id();
        self.lock_invalid_transition().push((id, f));
        id
    }

    /// Remove a subscription from whichever list holds it.
    ///
    /// Returns false when the id is unknown, including when it was already
    /// removed. Removal keeps the relative order of the remaining
    /// subscribers.
    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        {
            let mut list = self.lock_state_changed();
            if let Some(index) = list.iter().position(|(sid, _)| *sid == id) {
                list.remove(index);
                return true;
            }
        }
        let mut list = self.lock_invalid_transition();
        if let Some(index) = list.iter().position(|(sid, _)| *sid == id) {
            list.remove(index);
            return true;
        }
        false
    }

    pub(crate) fn publish_state_changed(&self, state: &str, args: &Args) {
        let subscribers: Vec<Arc<StateChangeFn>> = self
            .lock_state_changed()
            .iter()
            .map(|(_, f)| f.clone())
            .collect();
        for subscriber in subscribers {
            subscriber(state, args);
        }
    }

    pub(crate) fn publish_invalid_transition(&self, event: &str, state: &str) {
        let subscribers: Vec<Arc<InvalidTransitionFn>> = self
            .lock_invalid_transition()
            .iter()
            .map(|(_, f)| f.clone())
            .collect();
        for subscriber in subscribers {
            subscriber(event, state);
        }
    }

    pub(crate) fn state_change_count(&self) -> usize {
        self.lock_state_changed().len()
    }

    pub(crate) fn invalid_transition_count(&self) -> usize {
        self.lock_invalid_transition().len()
    }
}

impl fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationBus")
            .field("state_change_subscribers", &self.state_change_count())
            .field(
                "invalid_transition_subscribers",
                &self.invalid_transition_count(),
            )
            .finish()
    }
}
