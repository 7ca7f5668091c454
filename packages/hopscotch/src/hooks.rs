//! Hook naming, hook objects, and the context handed to a running hook.
//!
//! Every compiled event owns two hook slots: one derived from the event name
//! (fires first) and one derived from the target state (fires second). Both
//! default to no-ops; the builder's capability map overrides them by derived
//! name. Hooks run after the state commit and before the state-changed
//! notification, so a hook always observes the transition it is part of as
//! already applied.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::args::Args;
use crate::error::HopscotchError;
use crate::machine::Machine;

/// An installed hook: an async callable over the hook context and the
/// trigger's forwarded arguments.
pub type HookFn =
    Arc<dyn Fn(HookContext, Args) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Derive the hook name for an event or state identifier.
///
/// Plain identifiers gain an `on` prefix with the first character
/// capitalized; identifiers with a leading underscore keep it outside the
/// prefix:
///
/// ```
/// use hopscotch::hook_name;
///
/// assert_eq!(hook_name("connect"), "onConnect");
/// assert_eq!(hook_name("_connectDone"), "_onConnectDone");
/// ```
pub fn hook_name(id: &str) -> String {
    let (prefix, rest) = match id.strip_prefix('_') {
        Some(rest) => ("_on", rest),
        None => ("on", id),
    };
    let mut out = String::with_capacity(prefix.len() + rest.len());
    out.push_str(prefix);
    let mut chars = rest.chars();
    if let Some(first) = chars.next() {
        out.extend(first.to_uppercase());
        out.push_str(chars.as_str());
    }
    out
}

/// The default for every derived hook slot.
pub(crate) fn noop_hook() -> HookFn {
    Arc::new(|_ctx, _args| Box::pin(async { Ok(()) }))
}

/// Box a plain async closure into a [`HookFn`].
pub(crate) fn boxed_hook<F, Fut>(f: F) -> HookFn
where
    F: Fn(HookContext, Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |ctx, args| Box::pin(f(ctx, args)))
}

// =============================================================================
// Hook Context
// =============================================================================

/// Context passed to every hook invocation.
///
/// The context is a cheap clone of the machine handle, so a hook can read the
/// committed state and fire follow-up events on the machine it runs inside.
///
/// Follow-up futures returned by [`trigger`](HookContext::trigger) are
/// `'static`: a hook may await one inline (the follow-up transition then
/// completes, notifications included, before the current hook returns) or
/// hand it to `tokio::spawn` so it runs after the current transition
/// finishes.
#[derive(Clone)]
pub struct HookContext {
    machine: Machine,
}

impl HookContext {
    pub(crate) fn new(machine: Machine) -> Self {
        Self { machine }
    }

    /// The machine's current state.
    ///
    /// Inside a hook this is already the transition's target state; commits
    /// precede hooks.
    pub fn state(&self) -> String {
        self.machine.state()
    }

    /// Trigger a follow-up event with no arguments.
    pub fn trigger(&self, event: &str) -> BoxFuture<'static, Result<(), HopscotchError>> {
        self.machine.dispatch(event.to_string(), Args::new())
    }

    /// Trigger a follow-up event with forwarded arguments.
    pub fn trigger_with(
        &self,
        event: &str,
        args: Args,
    ) -> BoxFuture<'static, Result<(), HopscotchError>> {
        self.machine.dispatch(event.to_string(), args)
    }

    /// The full machine handle.
    ///
    /// Useful for subscribing to notifications from inside a hook or for
    /// coordinating other machines captured by the closure. Waiting here for
    /// the state this transition is entering will never resolve: its
    /// state-changed notification publishes only after the hooks return.
    pub fn machine(&self) -> Machine {
        self.machine.clone()
    }
}
