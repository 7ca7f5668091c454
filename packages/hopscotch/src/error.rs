//! Structured error types for table construction and machine operation.
//!
//! `BuildError` covers everything that can be rejected before a machine
//! exists; a table that builds is a table that runs. `HopscotchError` covers
//! the runtime surface: unknown events, expired waits, and hook failures.
//!
//! # The Rejection Rule
//!
//! > **An inadmissible trigger is not an error.**
//!
//! Triggering an event the table knows, from a state it does not allow, is a
//! normal outcome: the machine publishes an invalid-transition notification
//! and the trigger resolves `Ok(())`. Only events the table has never heard
//! of come back as [`HopscotchError::UnknownEvent`].

use std::time::Duration;

use thiserror::Error;

// =============================================================================
// Build Error
// =============================================================================

/// Validation failures raised while compiling a transition table.
///
/// These surface from [`MachineBuilder::build`](crate::MachineBuilder::build).
/// Every variant names what to fix; none of them can occur once a machine has
/// been constructed.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The transition table has no rows.
    #[error("transition table is empty; declare at least one transition rule")]
    EmptyTable,

    /// The initial state is not a valid identifier.
    #[error("initial state {value:?} is not a valid identifier")]
    InvalidInitial {
        /// The offending initial state value.
        value: String,
    },

    /// A rule field is empty or not a valid identifier.
    ///
    /// Identifiers start with an ASCII letter or underscore and continue with
    /// ASCII letters, digits, or underscores. Only the `from` field may hold
    /// the wildcard [`WILDCARD`](crate::WILDCARD) instead.
    #[error("{field} {value:?} is not a valid identifier")]
    InvalidIdentifier {
        /// Which rule field was rejected (`event`, `from`, or `to`).
        field: &'static str,
        /// The offending value.
        value: String,
    },

    /// Two rules for the same event disagree on the target state.
    ///
    /// All rules sharing an event form one fan-in group and must share one
    /// `to`; split the event into two names if two targets are intended.
    #[error("event {event:?} maps to both {first:?} and {second:?}; all rules for one event must share a target")]
    DivergentTarget {
        /// The event whose rules disagree.
        event: String,
        /// The target declared first.
        first: String,
        /// The conflicting target declared later.
        second: String,
    },

    /// A hook override names no derived hook.
    ///
    /// Derived names come from [`hook_name`](crate::hook_name) applied to the
    /// table's events and target states; anything else is a typo.
    #[error("hook {name:?} matches no derived hook name for this table")]
    UnknownHook {
        /// The unmatched capability-map key.
        name: String,
    },
}

// =============================================================================
// Hopscotch Error
// =============================================================================

/// Structured runtime error for machine operations.
///
/// This enum provides pattern-matchable errors for the trigger and wait
/// surfaces. Each variant includes context about what went wrong.
#[derive(Debug, Error)]
pub enum HopscotchError {
    /// The triggered event is not declared in the transition table.
    #[error("unknown event {event:?}")]
    UnknownEvent {
        /// The event name that matched no compiled entry.
        event: String,
    },

    /// A bounded wait expired before the state predicate matched.
    #[error("operation timed out after {duration:?}")]
    Timeout {
        /// How long we waited.
        duration: Duration,
    },

    /// A hook returned an error.
    ///
    /// The transition's state commit stands; no state-changed notification
    /// was published. The hook's own error is carried verbatim as the source.
    #[error("hook {hook} failed")]
    Hook {
        /// The derived name of the failing hook.
        hook: String,
        /// The error the hook returned.
        #[source]
        source: anyhow::Error,
    },
}
