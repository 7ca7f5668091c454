//! Machine construction and the dispatch pipeline.
//!
//! # Dispatch Order
//!
//! Every trigger walks the same pipeline:
//!
//! 1. Look the event up in the compiled table (unknown events are errors).
//! 2. Guard: is the event admissible from the current state? A rejection
//!    publishes invalid-transition and resolves `Ok` without suspending.
//! 3. Commit the target state. The commit happens before any hook runs, so
//!    the new state is observable the moment the guard admits the event.
//! 4. Await the on-event hook, then the on-state hook. A hook error
//!    propagates to the caller; the commit stands and no state-changed
//!    notification fires.
//! 5. Publish state-changed with the trigger's forwarded arguments.
//!
//! Guard and commit share one lock acquisition and no lock is held across an
//! await, so overlapping triggers interleave between steps but never observe
//! a half-applied transition. The engine does not serialize overlapping
//! triggers; callers that need strict ordering await each trigger before
//! issuing the next.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::BoxFuture;
use tracing::{debug, error};

use crate::args::Args;
use crate::bus::{InvalidTransitionFn, NotificationBus, StateChangeFn, SubscriptionId};
use crate::error::{BuildError, HopscotchError};
use crate::hooks::{boxed_hook, noop_hook, HookContext, HookFn};
use crate::table::{CompiledTable, TransitionTable};

pub(crate) struct MachineInner {
    pub(crate) name: String,
    table: CompiledTable,
    hooks: HashMap<String, HookFn>,
    state: Mutex<String>,
    pub(crate) bus: NotificationBus,
}

impl MachineInner {
    /// Acquire the state lock, recovering from poison if necessary.
    fn lock_state(&self) -> MutexGuard<'_, String> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn hook(&self, name: &str) -> HookFn {
        self.hooks.get(name).cloned().unwrap_or_else(noop_hook)
    }
}

/// A compiled, running state machine.
///
/// `Machine` is a cheap clone over a shared core; clones trigger, observe,
/// and wait on the same machine. Construction goes through
/// [`Machine::builder`].
#[derive(Clone)]
pub struct Machine {
    pub(crate) inner: Arc<MachineInner>,
}

impl Machine {
    /// Start building a machine from a declarative table.
    pub fn builder(table: TransitionTable) -> MachineBuilder {
        MachineBuilder::new(table)
    }

    /// The current state.
    pub fn state(&self) -> String {
        self.inner.lock_state().clone()
    }

    /// The diagnostic name used in log fields.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether the table declares `event`.
    pub fn has_event(&self, event: &str) -> bool {
        self.inner.table.entries.contains_key(event)
    }

    /// The declared event names, sorted.
    pub fn events(&self) -> Vec<String> {
        let mut events: Vec<String> = self.inner.table.entries.keys().cloned().collect();
        events.sort();
        events
    }

    /// Trigger an event with no arguments.
    ///
    /// See [`trigger_with`](Machine::trigger_with).
    pub async fn trigger(&self, event: &str) -> Result<(), HopscotchError> {
        self.dispatch(event.to_string(), Args::new()).await
    }

    /// Trigger an event, forwarding `args` to its hooks and to the resulting
    /// state-changed notification.
    ///
    /// The returned future resolves once the transition has fully completed:
    /// state committed, both hooks awaited, notification published. An event
    /// that is declared but not admissible from the current state is NOT an
    /// error; it publishes invalid-transition and resolves `Ok(())`
    /// immediately.
    pub async fn trigger_with(&self, event: &str, args: Args) -> Result<(), HopscotchError> {
        self.dispatch(event.to_string(), args).await
    }

    /// Subscribe to state-changed notifications.
    ///
    /// The callback receives the entered state and the triggering call's
    /// forwarded arguments, after the transition's hooks have completed.
    pub fn on_state_change<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(&str, &Args) + Send + Sync + 'static,
    {
        self.inner.bus.subscribe_state_change(Arc::new(f))
    }

    /// Subscribe to invalid-transition notifications.
    ///
    /// The callback receives the rejected event and the state the machine was
    /// in when it rejected it.
    pub fn on_invalid_transition<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.inner.bus.subscribe_invalid_transition(Arc::new(f))
    }

    /// Remove a subscription. Returns false when the id is unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.bus.unsubscribe(id)
    }

    /// Number of state-changed subscribers, waiters included.
    pub fn state_change_subscriber_count(&self) -> usize {
        self.inner.bus.state_change_count()
    }

    /// Number of invalid-transition subscribers.
    pub fn invalid_transition_subscriber_count(&self) -> usize {
        self.inner.bus.invalid_transition_count()
    }

    /// The dispatch pipeline behind `trigger`/`trigger_with`.
    ///
    /// Boxed so hooks can re-enter it for follow-up events, and `'static` so
    /// the future can be spawned detached.
    pub(crate) fn dispatch(
        &self,
        event: String,
        args: Args,
    ) -> BoxFuture<'static, Result<(), HopscotchError>> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            let Some(entry) = inner.table.entries.get(&event) else {
                return Err(HopscotchError::UnknownEvent { event });
            };

            // Guard and commit under a single lock acquisition; the lock is
            // never held across an await.
            let rejected_in = {
                let mut state = inner.lock_state();
                if entry.admits(&state) {
                    let from = std::mem::replace(&mut *state, entry.target.clone());
                    drop(state);
                    debug!(
                        machine = %inner.name,
                        event = %event,
                        from = %from,
                        to = %entry.target,
                        "state committed"
                    );
                    None
                } else {
                    Some(state.clone())
                }
            };

            if let Some(current) = rejected_in {
                debug!(
                    machine = %inner.name,
                    event = %event,
                    state = %current,
                    "transition rejected"
                );
                inner.bus.publish_invalid_transition(&event, &current);
                return Ok(());
            }

            let ctx = HookContext::new(Machine {
                inner: Arc::clone(&inner),
            });
            run_hook(&inner, &entry.on_event_name, &event, ctx.clone(), args.clone()).await?;
            run_hook(&inner, &entry.on_state_name, &event, ctx, args.clone()).await?;

            inner.bus.publish_state_changed(&entry.target, &args);
            Ok(())
        })
    }
}

impl fmt::Debug for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("name", &self.inner.name)
            .field("state", &*self.inner.lock_state())
            .finish_non_exhaustive()
    }
}

async fn run_hook(
    inner: &MachineInner,
    name: &str,
    event: &str,
    ctx: HookContext,
    args: Args,
) -> Result<(), HopscotchError> {
    let hook = inner.hook(name);
    if let Err(e) = hook(ctx, args).await {
        error!(
            machine = %inner.name,
            hook = %name,
            event = %event,
            error = ?e,
            "hook failed"
        );
        return Err(HopscotchError::Hook {
            hook: name.to_string(),
            source: e,
        });
    }
    Ok(())
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`Machine`].
///
/// Hooks and subscribers registered here are installed before the synthetic
/// initial state-changed notification, which `build` publishes as its last
/// step; a builder-registered subscriber therefore observes the machine
/// entering its initial state.
pub struct MachineBuilder {
    table: TransitionTable,
    name: String,
    hooks: Vec<(String, HookFn)>,
    state_change: Vec<Arc<StateChangeFn>>,
    invalid_transition: Vec<Arc<InvalidTransitionFn>>,
}

impl MachineBuilder {
    /// Start a builder from a declarative table.
    pub fn new(table: TransitionTable) -> Self {
        Self {
            table,
            name: "machine".to_string(),
            hooks: Vec::new(),
            state_change: Vec::new(),
            invalid_transition: Vec::new(),
        }
    }

    /// Set the diagnostic name used in log fields.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Override a derived hook.
    ///
    /// `name` must be one of the table's derived hook names (see
    /// [`hook_name`](crate::hook_name)); anything else fails `build` with
    /// [`BuildError::UnknownHook`]. Registering the same name twice keeps the
    /// later hook.
    pub fn hook<F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(HookContext, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.hooks.push((name.into(), boxed_hook(f)));
        self
    }

    /// Subscribe to state-changed notifications before construction.
    pub fn on_state_change<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &Args) + Send + Sync + 'static,
    {
        self.state_change.push(Arc::new(f));
        self
    }

    /// Subscribe to invalid-transition notifications before construction.
    pub fn on_invalid_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.invalid_transition.push(Arc::new(f));
        self
    }

    /// Compile the table, validate the capability map, and start the machine
    /// in its initial state.
    pub fn build(self) -> Result<Machine, BuildError> {
        let compiled = CompiledTable::compile(&self.table)?;
        let derived = compiled.hook_names();

        let mut hooks: HashMap<String, HookFn> = derived
            .iter()
            .map(|name| (name.clone(), noop_hook()))
            .collect();
        for (name, hook) in self.hooks {
            if !derived.contains(&name) {
                return Err(BuildError::UnknownHook { name });
            }
            hooks.insert(name, hook);
        }

        let bus = NotificationBus::new();
        for subscriber in self.state_change {
            bus.subscribe_state_change(subscriber);
        }
        for subscriber in self.invalid_transition {
            bus.subscribe_invalid_transition(subscriber);
        }

        let initial = compiled.initial.clone();
        let machine = Machine {
            inner: Arc::new(MachineInner {
                name: self.name,
                table: compiled,
                hooks,
                state: Mutex::new(initial.clone()),
                bus,
            }),
        };

        debug!(machine = %machine.inner.name, state = %initial, "machine built");
        // The synthetic initial notification carries no forwarded arguments.
        machine.inner.bus.publish_state_changed(&initial, &Args::new());
        Ok(machine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TransitionRule;
    use crate::testing::Recorder;
    use std::sync::Mutex as StdMutex;

    fn two_step_table() -> TransitionTable {
        TransitionTable::new(
            "a",
            vec![
                TransitionRule::new("go", "a", "b"),
                TransitionRule::new("finish", "b", "c"),
            ],
        )
    }

    #[test]
    fn test_build_starts_in_the_initial_state() {
        let machine = Machine::builder(two_step_table()).build().unwrap();
        assert_eq!(machine.state(), "a");
        assert_eq!(machine.name(), "machine");
    }

    #[test]
    fn test_build_publishes_the_synthetic_initial_notification() {
        let recorder = Recorder::new();
        let arg_counts = Arc::new(StdMutex::new(Vec::new()));

        let counts = arg_counts.clone();
        let _machine = recorder
            .instrument(Machine::builder(two_step_table()))
            .on_state_change(move |_state, args| counts.lock().unwrap().push(args.len()))
            .build()
            .unwrap();

        assert_eq!(recorder.states(), vec!["a"]);
        assert_eq!(*arg_counts.lock().unwrap(), vec![0]);
        assert!(recorder.rejections().is_empty());
    }

    #[test]
    fn test_unknown_hook_override_fails_the_build() {
        let err = Machine::builder(two_step_table())
            .hook("onGone", |_ctx, _args| async { Ok(()) })
            .build()
            .unwrap_err();

        match err {
            BuildError::UnknownHook { name } => assert_eq!(name, "onGone"),
            other => panic!("expected UnknownHook, got {other:?}"),
        }
    }

    #[test]
    fn test_events_are_reported_sorted() {
        let machine = Machine::builder(two_step_table()).build().unwrap();
        assert_eq!(machine.events(), vec!["finish", "go"]);
        assert!(machine.has_event("go"));
        assert!(!machine.has_event("gone"));
    }

    #[tokio::test]
    async fn test_unknown_event_is_an_error() {
        let machine = Machine::builder(two_step_table()).build().unwrap();
        let err = machine.trigger("warp").await.unwrap_err();
        assert!(matches!(err, HopscotchError::UnknownEvent { event } if event == "warp"));
        assert_eq!(machine.state(), "a");
    }

    #[tokio::test]
    async fn test_rejection_publishes_and_resolves_ok() {
        let recorder = Recorder::new();
        let machine = Machine::builder(two_step_table()).build().unwrap();
        recorder.attach(&machine);

        machine.trigger("finish").await.unwrap();

        assert_eq!(machine.state(), "a");
        assert!(recorder.states().is_empty());
        assert_eq!(
            recorder.rejections(),
            vec![("finish".to_string(), "a".to_string())]
        );
    }

    #[tokio::test]
    async fn test_commit_precedes_hooks() {
        let observed = Arc::new(StdMutex::new(Vec::new()));

        let seen = observed.clone();
        let machine = Machine::builder(two_step_table())
            .hook("onGo", move |ctx, _args| {
                let seen = seen.clone();
                async move {
                    seen.lock().unwrap().push(ctx.state());
                    Ok(())
                }
            })
            .build()
            .unwrap();

        machine.trigger("go").await.unwrap();
        assert_eq!(*observed.lock().unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_hooks_run_in_order_before_the_notification() {
        let log: Arc<StdMutex<Vec<String>>> = Arc::default();

        let event_log = log.clone();
        let state_log = log.clone();
        let notify_log = log.clone();
        let machine = Machine::builder(two_step_table())
            .hook("onGo", move |_ctx, _args| {
                let log = event_log.clone();
                async move {
                    log.lock().unwrap().push("hook:onGo".to_string());
                    Ok(())
                }
            })
            .hook("onB", move |_ctx, _args| {
                let log = state_log.clone();
                async move {
                    log.lock().unwrap().push("hook:onB".to_string());
                    Ok(())
                }
            })
            .build()
            .unwrap();
        machine.on_state_change(move |state, _args| {
            notify_log.lock().unwrap().push(format!("notify:{state}"));
        });

        machine.trigger("go").await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["hook:onGo", "hook:onB", "notify:b"]
        );
    }

    #[tokio::test]
    async fn test_hook_failure_keeps_the_commit_and_suppresses_the_notification() {
        let recorder = Recorder::new();
        let machine = Machine::builder(two_step_table())
            .hook("onB", |_ctx, _args| async { anyhow::bail!("igniter jammed") })
            .build()
            .unwrap();
        recorder.attach(&machine);

        let err = machine.trigger("go").await.unwrap_err();

        match err {
            HopscotchError::Hook { hook, source } => {
                assert_eq!(hook, "onB");
                assert_eq!(source.to_string(), "igniter jammed");
            }
            other => panic!("expected Hook, got {other:?}"),
        }
        assert_eq!(machine.state(), "b");
        assert!(recorder.states().is_empty());
        assert!(recorder.rejections().is_empty());
    }

    #[tokio::test]
    async fn test_event_hook_failure_skips_the_state_hook() {
        let ran_state_hook = Arc::new(StdMutex::new(false));

        let flag = ran_state_hook.clone();
        let machine = Machine::builder(two_step_table())
            .hook("onGo", |_ctx, _args| async { anyhow::bail!("nope") })
            .hook("onB", move |_ctx, _args| {
                let flag = flag.clone();
                async move {
                    *flag.lock().unwrap() = true;
                    Ok(())
                }
            })
            .build()
            .unwrap();

        let err = machine.trigger("go").await.unwrap_err();
        assert!(matches!(err, HopscotchError::Hook { hook, .. } if hook == "onGo"));
        assert!(!*ran_state_hook.lock().unwrap());
        assert_eq!(machine.state(), "b");
    }

    #[tokio::test]
    async fn test_args_flow_to_hooks_and_notification() {
        let hook_arg = Arc::new(StdMutex::new(None));
        let notified_arg = Arc::new(StdMutex::new(None));

        let seen = hook_arg.clone();
        let machine = Machine::builder(two_step_table())
            .hook("onGo", move |_ctx, args| {
                let seen = seen.clone();
                async move {
                    *seen.lock().unwrap() = args.get::<String>(0).cloned();
                    Ok(())
                }
            })
            .build()
            .unwrap();

        let notified = notified_arg.clone();
        machine.on_state_change(move |_state, args| {
            *notified.lock().unwrap() = args.get::<String>(0).cloned();
        });

        machine
            .trigger_with("go", Args::new().with("payload".to_string()))
            .await
            .unwrap();

        assert_eq!(hook_arg.lock().unwrap().as_deref(), Some("payload"));
        assert_eq!(notified_arg.lock().unwrap().as_deref(), Some("payload"));
    }

    #[tokio::test]
    async fn test_inline_follow_up_publishes_before_its_parent() {
        let recorder = Recorder::new();
        let machine = Machine::builder(two_step_table())
            .hook("onB", |ctx, _args| async move {
                // Awaiting inline runs the follow-up transition to completion,
                // notification included, before this hook returns.
                ctx.trigger("finish").await?;
                Ok(())
            })
            .build()
            .unwrap();
        recorder.attach(&machine);

        machine.trigger("go").await.unwrap();

        assert_eq!(machine.state(), "c");
        assert_eq!(recorder.states(), vec!["c", "b"]);
    }

    #[tokio::test]
    async fn test_clones_share_the_machine() {
        let machine = Machine::builder(two_step_table()).build().unwrap();
        let clone = machine.clone();

        clone.trigger("go").await.unwrap();
        assert_eq!(machine.state(), "b");
    }

    #[test]
    fn test_unsubscribe_via_the_machine() {
        let machine = Machine::builder(two_step_table()).build().unwrap();
        let id = machine.on_state_change(|_, _| {});
        assert_eq!(machine.state_change_subscriber_count(), 1);
        assert!(machine.unsubscribe(id));
        assert!(!machine.unsubscribe(id));
        assert_eq!(machine.state_change_subscriber_count(), 0);
    }

    #[test]
    fn test_debug_names_the_machine_and_state() {
        let machine = Machine::builder(two_step_table())
            .name("probe")
            .build()
            .unwrap();
        let debug = format!("{machine:?}");
        assert!(debug.contains("probe"));
        assert!(debug.contains('a'));
    }
}
