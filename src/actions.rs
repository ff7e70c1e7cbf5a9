//! Action bindings
//!
//! Callbacks are attached to a state for one of four lifecycle events (see
//! [`ActionEvent`]). The [`ActionRegistry`] keeps them per state handle, in
//! registration order, and is only read by the dispatcher.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use crate::error::ActionError;
use crate::value::Value;

/// Result returned by every action callback
pub type ActionResult = Result<(), ActionError>;

/// Callback bound to a state lifecycle event
pub type Action<S, E> = Arc<dyn Fn(&Transition<S, E>) -> ActionResult + Send + Sync>;

/// Lifecycle event an action is bound to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionEvent<E> {
    /// Any entry into the state
    OnEntry,
    /// Entry caused by this trigger; replaces `OnEntry` for that trigger
    OnEntryFrom(E),
    /// Any exit from the state
    OnExit,
    /// Internal transition handled by the state
    OnInternal(E),
}

/// Description of the transition an action runs for
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<S, E> {
    /// Active leaf state when the trigger was fired
    pub source: S,
    /// Leaf state the machine ends in
    pub destination: S,
    /// Fired trigger
    pub trigger: E,
    /// Argument supplied with the trigger
    pub arg: Option<Value>,
}

impl<S: PartialEq, E> Transition<S, E> {
    /// True when the source and destination leaf identifiers are equal.
    ///
    /// Only the identifiers are compared. Internal transitions report `true`
    /// as well, and an inherited rule that targets an ancestor of the source
    /// reports `false` although the source is exited.
    pub fn is_reentry(&self) -> bool {
        self.source == self.destination
    }

    /// The argument, if any
    pub fn arg(&self) -> Option<&Value> {
        self.arg.as_ref()
    }

    /// Integer argument of a trigger declared with [`ParamType::Int`](crate::ParamType::Int)
    pub fn int_arg(&self) -> Option<i64> {
        self.arg.as_ref().and_then(Value::as_int)
    }

    /// String argument of a trigger declared with [`ParamType::Text`](crate::ParamType::Text)
    pub fn text_arg(&self) -> Option<&str> {
        self.arg.as_ref().and_then(Value::as_text)
    }

    /// Boolean argument
    pub fn bool_arg(&self) -> Option<bool> {
        self.arg.as_ref().and_then(Value::as_bool)
    }

    /// Float argument
    pub fn float_arg(&self) -> Option<f64> {
        self.arg.as_ref().and_then(Value::as_float)
    }
}

impl<S: fmt::Debug, E: fmt::Debug> fmt::Display for Transition<S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} --{:?}--> {:?}", self.source, self.trigger, self.destination)
    }
}

struct StateActions<S, E> {
    entry: Vec<Action<S, E>>,
    entry_from: HashMap<E, Vec<Action<S, E>>>,
    exit: Vec<Action<S, E>>,
    internal: HashMap<E, Vec<Action<S, E>>>,
}

impl<S, E> Default for StateActions<S, E> {
    fn default() -> Self {
        Self {
            entry: Vec::new(),
            entry_from: HashMap::new(),
            exit: Vec::new(),
            internal: HashMap::new(),
        }
    }
}

/// Per-state action tables, indexed by state handle
pub(crate) struct ActionRegistry<S, E> {
    states: Vec<StateActions<S, E>>,
}

impl<S, E: Eq + Hash> ActionRegistry<S, E> {
    pub(crate) fn new() -> Self {
        Self { states: Vec::new() }
    }

    /// Reserve an empty table for a newly added state
    pub(crate) fn add_state(&mut self) {
        self.states.push(StateActions::default());
    }

    pub(crate) fn bind(&mut self, state: usize, event: ActionEvent<E>, action: Action<S, E>) {
        let table = &mut self.states[state];
        match event {
            ActionEvent::OnEntry => table.entry.push(action),
            ActionEvent::OnEntryFrom(trigger) => {
                table.entry_from.entry(trigger).or_default().push(action)
            }
            ActionEvent::OnExit => table.exit.push(action),
            ActionEvent::OnInternal(trigger) => {
                table.internal.entry(trigger).or_default().push(action)
            }
        }
    }

    /// Entry actions for `state`. With `trigger` set, trigger-specific
    /// bindings win over the generic ones when present.
    pub(crate) fn entry_actions(&self, state: usize, trigger: Option<&E>) -> &[Action<S, E>] {
        let table = &self.states[state];
        trigger
            .and_then(|t| table.entry_from.get(t))
            .filter(|actions| !actions.is_empty())
            .unwrap_or(&table.entry)
    }

    pub(crate) fn exit_actions(&self, state: usize) -> &[Action<S, E>] {
        &self.states[state].exit
    }

    pub(crate) fn internal_actions(&self, state: usize, trigger: &E) -> &[Action<S, E>] {
        self.states[state]
            .internal
            .get(trigger)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    #[cfg(test)]
    /// Number of bindings of each kind for `state`: (entry, entry-from, exit, internal)
    pub(crate) fn counts(&self, state: usize) -> (usize, usize, usize, usize) {
        let table = &self.states[state];
        (
            table.entry.len(),
            table.entry_from.values().map(Vec::len).sum(),
            table.exit.len(),
            table.internal.values().map(Vec::len).sum(),
        )
    }
}
