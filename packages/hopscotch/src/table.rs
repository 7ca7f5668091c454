//! Transition tables: the declarative input and its compiled form.
//!
//! A [`TransitionTable`] is plain data (and serde-friendly, so tables can be
//! loaded from configuration). Compilation happens once at build time and
//! produces one entry per event:
//!
//! - the union of every `from` the event's rules declare,
//! - a wildcard flag, set if any rule uses [`WILDCARD`] as its source,
//! - the single target state all rules for the event must agree on,
//! - the derived hook names for the event and the target state.
//!
//! Rules sharing an event fan in; rules disagreeing on the target are a
//! [`BuildError::DivergentTarget`] rather than a silent override.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::BuildError;
use crate::hooks::hook_name;

/// A rule with this source is admissible from any state.
pub const WILDCARD: &str = "*";

// =============================================================================
// Declarative Input
// =============================================================================

/// One row of a transition table: `event` moves the machine from `from` to
/// `to`.
///
/// `event` and `to` must be identifiers (ASCII letter or underscore first,
/// then letters, digits, or underscores). `from` may instead be [`WILDCARD`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRule {
    /// The event name. Accepts the compact key `ev` when deserialized.
    #[serde(alias = "ev")]
    pub event: String,
    /// The source state, or [`WILDCARD`].
    pub from: String,
    /// The target state.
    pub to: String,
}

impl TransitionRule {
    /// Create a rule.
    pub fn new(event: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            from: from.into(),
            to: to.into(),
        }
    }
}

/// A complete declarative machine definition: where it starts and every move
/// it can make.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionTable {
    /// The state the machine occupies at construction.
    pub initial: String,
    /// The transition rules, in declaration order.
    pub transitions: Vec<TransitionRule>,
}

impl TransitionTable {
    /// Create a table.
    pub fn new(initial: impl Into<String>, transitions: Vec<TransitionRule>) -> Self {
        Self {
            initial: initial.into(),
            transitions,
        }
    }

    /// Parse a table from a JSON document.
    ///
    /// Semantic validation still happens at
    /// [`MachineBuilder::build`](crate::MachineBuilder::build); this only
    /// rejects malformed JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// =============================================================================
// Compiled Form
// =============================================================================

/// The compiled dispatch data for one event.
#[derive(Debug)]
pub(crate) struct EventEntry {
    /// States the event may fire from (wildcard rules excluded).
    pub(crate) sources: HashSet<String>,
    /// True when any rule for this event declared [`WILDCARD`] as its source.
    pub(crate) wildcard: bool,
    /// The state the event commits.
    pub(crate) target: String,
    /// Derived hook name for the event itself.
    pub(crate) on_event_name: String,
    /// Derived hook name for the target state.
    pub(crate) on_state_name: String,
}

impl EventEntry {
    /// Whether the event is admissible from `state`.
    pub(crate) fn admits(&self, state: &str) -> bool {
        self.wildcard || self.sources.contains(state)
    }
}

/// A validated table, indexed per event.
#[derive(Debug)]
pub(crate) struct CompiledTable {
    pub(crate) initial: String,
    pub(crate) entries: HashMap<String, EventEntry>,
}

impl CompiledTable {
    /// Compile and validate a declarative table.
    pub(crate) fn compile(table: &TransitionTable) -> Result<Self, BuildError> {
        if table.transitions.is_empty() {
            return Err(BuildError::EmptyTable);
        }
        if !is_identifier(&table.initial) {
            return Err(BuildError::InvalidInitial {
                value: table.initial.clone(),
            });
        }

        let mut entries: HashMap<String, EventEntry> = HashMap::new();
        for rule in &table.transitions {
            if !is_identifier(&rule.event) {
                return Err(BuildError::InvalidIdentifier {
                    field: "event",
                    value: rule.event.clone(),
                });
            }
            if rule.from != WILDCARD && !is_identifier(&rule.from) {
                return Err(BuildError::InvalidIdentifier {
                    field: "from",
                    value: rule.from.clone(),
                });
            }
            if !is_identifier(&rule.to) {
                return Err(BuildError::InvalidIdentifier {
                    field: "to",
                    value: rule.to.clone(),
                });
            }

            let entry = entries
                .entry(rule.event.clone())
                .or_insert_with(|| EventEntry {
                    sources: HashSet::new(),
                    wildcard: false,
                    target: rule.to.clone(),
                    on_event_name: hook_name(&rule.event),
                    on_state_name: hook_name(&rule.to),
                });

            if entry.target != rule.to {
                return Err(BuildError::DivergentTarget {
                    event: rule.event.clone(),
                    first: entry.target.clone(),
                    second: rule.to.clone(),
                });
            }
            if rule.from == WILDCARD {
                entry.wildcard = true;
            } else {
                entry.sources.insert(rule.from.clone());
            }
        }

        Ok(Self {
            initial: table.initial.clone(),
            entries,
        })
    }

    /// Every derived hook name this table refers to, in stable order.
    pub(crate) fn hook_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for entry in self.entries.values() {
            names.insert(entry.on_event_name.clone());
            names.insert(entry.on_state_name.clone());
        }
        names
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
