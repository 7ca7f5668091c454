//! Awaiting state arrivals and departures.
//!
//! Waits ride the state-changed notification stream. The fast path resolves
//! without subscribing at all; the slow path installs a predicate subscriber
//! that releases a [`Notify`] permit, re-checks the state to close the
//! subscribe race, and parks. The subscription is removed by an RAII guard on
//! every exit, resolve, timeout, and caller cancellation alike, so timed-out
//! waiters never leak subscribers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::args::Args;
use crate::bus::SubscriptionId;
use crate::error::HopscotchError;
use crate::machine::{Machine, MachineInner};

#[derive(Clone, Copy)]
enum WaitKind {
    Entered,
    Left,
}

fn satisfied(current: &str, target: &str, kind: WaitKind) -> bool {
    match kind {
        WaitKind::Entered => current == target,
        WaitKind::Left => current != target,
    }
}

/// Removes the wait subscription when the wait future is dropped.
struct SubscriptionGuard {
    inner: Arc<MachineInner>,
    id: SubscriptionId,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.inner.bus.unsubscribe(self.id);
    }
}

impl Machine {
    /// Resolve once the machine is in `state`.
    ///
    /// Resolves immediately when the machine is already there. Otherwise the
    /// wait releases on the first state-changed notification that enters
    /// `state`; because notifications publish after a transition's hooks, the
    /// release observes the fully completed transition.
    pub async fn wait_until_entered(&self, state: &str) {
        self.wait(state, WaitKind::Entered).await;
    }

    /// Resolve once the machine is NOT in `state`.
    ///
    /// Resolves immediately when the machine is elsewhere. A self-transition
    /// re-entering `state` does not release the wait.
    pub async fn wait_until_left(&self, state: &str) {
        self.wait(state, WaitKind::Left).await;
    }

    /// [`wait_until_entered`](Machine::wait_until_entered) bounded by
    /// `limit`, failing with [`HopscotchError::Timeout`] on expiry.
    pub async fn wait_until_entered_timeout(
        &self,
        state: &str,
        limit: Duration,
    ) -> Result<(), HopscotchError> {
        tokio::time::timeout(limit, self.wait(state, WaitKind::Entered))
            .await
            .map_err(|_| HopscotchError::Timeout { duration: limit })
    }

    /// [`wait_until_left`](Machine::wait_until_left) bounded by `limit`,
    /// failing with [`HopscotchError::Timeout`] on expiry.
    pub async fn wait_until_left_timeout(
        &self,
        state: &str,
        limit: Duration,
    ) -> Result<(), HopscotchError> {
        tokio::time::timeout(limit, self.wait(state, WaitKind::Left))
            .await
            .map_err(|_| HopscotchError::Timeout { duration: limit })
    }

    async fn wait(&self, state: &str, kind: WaitKind) {
        if satisfied(&self.state(), state, kind) {
            return;
        }

        let notify = Arc::new(Notify::new());
        let signal = Arc::clone(&notify);
        let target = state.to_string();
        let id = self
            .inner
            .bus
            .subscribe_state_change(Arc::new(move |entered: &str, _args: &Args| {
                if satisfied(entered, &target, kind) {
                    // Stores a permit even when the waiter is not yet parked.
                    signal.notify_one();
                }
            }));
        let _guard = SubscriptionGuard {
            inner: Arc::clone(&self.inner),
            id,
        };

        // A transition may have landed between the first check and the
        // subscription; the permit semantics cover everything after it.
        if satisfied(&self.state(), state, kind) {
            return;
        }

        notify.notified().await;
    }
}
