//! Test support: a recorder for machine notifications.
//!
//! Compiled for this crate's own tests and for dependents that enable the
//! `testing` feature.

use std::sync::{Arc, Mutex};

use crate::machine::{Machine, MachineBuilder};

/// Records every notification a machine publishes.
///
/// Clones share storage, so one handle can be moved into subscriptions while
/// the test keeps another for assertions.
#[derive(Clone, Default)]
pub struct Recorder {
    inner: Arc<RecorderInner>,
}

#[derive(Default)]
struct RecorderInner {
    states: Mutex<Vec<String>>,
    rejections: Mutex<Vec<(String, String)>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe this recorder on a builder, so it also hears the synthetic
    /// initial notification published at the end of `build`.
    pub fn instrument(&self, builder: MachineBuilder) -> MachineBuilder {
        let on_state = self.clone();
        let on_invalid = self.clone();
        builder
            .on_state_change(move |state, _args| on_state.push_state(state))
            .on_invalid_transition(move |event, state| on_invalid.push_rejection(event, state))
    }

    /// Subscribe this recorder on a built machine. It hears later
    /// notifications only; the initial one has already fired.
    pub fn attach(&self, machine: &Machine) {
        let on_state = self.clone();
        machine.on_state_change(move |state, _args| on_state.push_state(state));
        let on_invalid = self.clone();
        machine.on_invalid_transition(move |event, state| on_invalid.push_rejection(event, state));
    }

    /// Entered states, in publication order.
    pub fn states(&self) -> Vec<String> {
        self.inner.states.lock().unwrap().clone()
    }

    /// Rejected `(event, state)` pairs, in publication order.
    pub fn rejections(&self) -> Vec<(String, String)> {
        self.inner.rejections.lock().unwrap().clone()
    }

    /// Drop everything recorded so far.
    pub fn clear(&self) {
        self.inner.states.lock().unwrap().clear();
        self.inner.rejections.lock().unwrap().clear();
    }

    fn push_state(&self, state: &str) {
        self.inner.states.lock().unwrap().push(state.to_string());
    }

    fn push_rejection(&self, event: &str, state: &str) {
        self.inner
            .rejections
            .lock()
            .unwrap()
            .push((event.to_string(), state.to_string()));
    }
}
