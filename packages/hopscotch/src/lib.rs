//! # Hopscotch
//!
//! An async state-machine engine where tables declare what may happen,
//! hooks perform it, and notifications broadcast it.
//!
//! ## Core Concepts
//!
//! Hopscotch separates **structure** from **behavior**:
//! - [`TransitionTable`] = Structure (which event moves which state where)
//! - Hooks = Behavior (async work that runs when a transition commits)
//!
//! The table is compiled up front into per-event dispatch entries, and every
//! entry derives two hook names: an on-event hook (`connect` → `onConnect`)
//! and an on-state hook for the entered state (`connecting` → `onConnecting`).
//! Every derived hook defaults to a no-op; [`MachineBuilder::hook`] overrides
//! the ones that matter.
//!
//! ## Architecture
//!
//! ```text
//! trigger(event, args)
//!     │
//!     ▼ lookup
//! compiled table ──── unknown event ──► Err(UnknownEvent)
//!     │
//!     ▼ guard
//! admissible from the current state?
//!     │
//!     ├─ no ──► publish invalid-transition ──► Ok(())
//!     │
//!     ▼ commit (the state changes HERE)
//!     │
//!     ▼ await on-event hook ──── Err ──► Err(Hook), commit stands
//!     │
//!     ▼ await on-state hook ──── Err ──► Err(Hook), commit stands
//!     │
//!     ▼
//! publish state-changed(state, args) ──► subscribers, then waiters release
//! ```
//!
//! ## Key Invariants
//!
//! 1. **Tables are validated at build** - Empty tables, bad identifiers, and
//!    divergent fan-in targets never reach runtime
//! 2. **Commit precedes hooks** - A hook observing [`HookContext::state`]
//!    sees the entered state
//! 3. **Rejections are not errors** - An inadmissible event publishes
//!    invalid-transition and resolves `Ok(())`
//! 4. **Hook failures stick** - The commit stands, no state-changed fires,
//!    and the caller gets the hook's error verbatim
//! 5. **Exactly one notification per trigger** - state-changed on commit,
//!    invalid-transition on rejection, never both, never neither
//! 6. **Delivery is ordered** - Subscribers hear notifications in insertion
//!    order, after the transition's hooks have finished
//! 7. **Waits never leak** - Resolve, time out, or cancel; the temporary
//!    subscription is always removed
//!
//! ## Guarantees
//!
//! - **Synchronous delivery**: Notification callbacks run on the triggering
//!   task; keep them cheap
//! - **No trigger serialization**: Overlapping triggers interleave between
//!   pipeline steps (each step itself is atomic)
//!
//! For strict ordering, await each trigger before issuing the next, or fan
//! everything through one task.
//!
//! ## Example
//!
//! ```ignore
//! use hopscotch::{Args, Machine, TransitionRule, TransitionTable};
//! use std::time::Duration;
//!
//! // 1. Declare the table (structure)
//! let table = TransitionTable::new(
//!     "disconnected",
//!     vec![
//!         TransitionRule::new("connect", "disconnected", "connecting"),
//!         TransitionRule::new("_connectDone", "connecting", "connected"),
//!         TransitionRule::new("disconnect", "connected", "disconnecting"),
//!         TransitionRule::new("_disconnectDone", "disconnecting", "disconnected"),
//!     ],
//! );
//!
//! // 2. Override the hooks that matter (behavior)
//! let machine = Machine::builder(table)
//!     .name("client")
//!     .hook("onConnecting", |ctx, args| async move {
//!         let url = args.get::<String>(0).ok_or_else(|| anyhow::anyhow!("missing url"))?;
//!         open_socket(url).await?;
//!         // Completion arrives later, on its own task.
//!         tokio::spawn(ctx.trigger("_connectDone"));
//!         Ok(())
//!     })
//!     .build()?;
//!
//! // 3. Observe
//! machine.on_state_change(|state, _args| println!("entered {state}"));
//!
//! // 4. Drive and wait
//! machine
//!     .trigger_with("connect", Args::new().with("wss://example.test".to_string()))
//!     .await?;
//! machine
//!     .wait_until_entered_timeout("connected", Duration::from_secs(5))
//!     .await?;
//! ```
//!
//! ## What This Is Not
//!
//! Hopscotch is **not**:
//! - A statechart engine (no hierarchy, no guard expressions)
//! - A workflow engine (no persistence, no history, no replay)
//! - A distributed machine (one process, one state)

// Core modules
mod args;
mod bus;
mod error;
mod hooks;
mod machine;
mod table;
mod wait;

// Testing utilities (also compiled for this crate's own tests)
#[cfg(any(test, feature = "testing"))]
pub mod testing;


// Stress tests (test-only)
#[cfg(test)]
mod stress_tests;

// Re-export table types
pub use crate::table::{TransitionRule, TransitionTable, WILDCARD};

// Re-export machine types
pub use crate::machine::{Machine, MachineBuilder};

// Re-export hook plumbing
pub use crate::hooks::{hook_name, HookContext, HookFn};

// Re-export notification types
pub use crate::args::Args;
pub use crate::bus::{InvalidTransitionFn, StateChangeFn, SubscriptionId};

// Re-export error types
pub use crate::error::{BuildError, HopscotchError};
