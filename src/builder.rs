//! Builder pattern implementation for state graphs

use std::fmt::Debug;
use std::sync::Arc;

use crate::actions::{ActionEvent, Transition};
use crate::error::{ActionError, FsmError, FsmResult};
use crate::graph::{Identifier, StateGraph};
use crate::value::{ParamType, Value};

/// Builder for constructing state graphs.
///
/// Every method mirrors a [`StateGraph`] configuration operation. The first
/// failing step is kept and all later steps are skipped, so [`build`](Self::build)
/// either returns a complete graph or the error that stopped it.
pub struct StateGraphBuilder<S: Debug, E: Debug> {
    graph: StateGraph<S, E>,
    error: Option<FsmError<S, E>>,
}

impl<S: Identifier, E: Identifier> Default for StateGraphBuilder<S, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Identifier, E: Identifier> StateGraphBuilder<S, E> {
    /// Create an empty builder
    pub fn new() -> Self {
        Self {
            graph: StateGraph::new(),
            error: None,
        }
    }

    fn step<F>(mut self, op: F) -> Self
    where
        F: FnOnce(&mut StateGraph<S, E>) -> FsmResult<(), S, E>,
    {
        if self.error.is_none() {
            if let Err(err) = op(&mut self.graph) {
                self.error = Some(err);
            }
        }
        self
    }

    /// Add a top-level state
    pub fn state(self, id: S) -> Self {
        self.step(|g| g.add_state(id))
    }

    /// Add a substate of an already added `parent`
    pub fn substate(self, id: S, parent: S) -> Self {
        self.step(|g| g.add_substate(id, parent))
    }

    /// Declare the parameter type of a trigger
    pub fn trigger_parameter(self, trigger: E, param: ParamType) -> Self {
        self.step(|g| g.declare_trigger_parameter(trigger, param))
    }

    /// Add an external transition
    pub fn permit(self, state: S, trigger: E, target: S) -> Self {
        self.step(|g| g.permit(state, trigger, target))
    }

    /// Add a guarded external transition
    pub fn permit_if<G>(self, state: S, trigger: E, target: S, description: &str, guard: G) -> Self
    where
        G: Fn(Option<&Value>) -> bool + Send + Sync + 'static,
    {
        self.step(|g| g.permit_if(state, trigger, target, description, guard))
    }

    /// Add an internal transition without a handler
    pub fn permit_internal(self, state: S, trigger: E) -> Self {
        self.step(|g| g.permit_internal(state, trigger))
    }

    /// Add an internal transition and its handler
    pub fn internal_transition<F>(self, state: S, trigger: E, action: F) -> Self
    where
        F: Fn(&Transition<S, E>) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        self.step(|g| g.internal_transition(state, trigger, action))
    }

    /// Run `action` on every entry into `state`
    pub fn on_entry<F>(self, state: S, action: F) -> Self
    where
        F: Fn(&Transition<S, E>) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        self.step(|g| g.bind(state, ActionEvent::OnEntry, Arc::new(action)))
    }

    /// Run `action` when `state` is entered through `trigger`
    pub fn on_entry_from<F>(self, state: S, trigger: E, action: F) -> Self
    where
        F: Fn(&Transition<S, E>) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        self.step(|g| g.bind(state, ActionEvent::OnEntryFrom(trigger), Arc::new(action)))
    }

    /// Run `action` on every exit from `state`
    pub fn on_exit<F>(self, state: S, action: F) -> Self
    where
        F: Fn(&Transition<S, E>) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        self.step(|g| g.bind(state, ActionEvent::OnExit, Arc::new(action)))
    }

    /// Handle `trigger` inside `state`; the internal rule must be added separately
    pub fn on_internal<F>(self, state: S, trigger: E, action: F) -> Self
    where
        F: Fn(&Transition<S, E>) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        self.step(|g| g.bind(state, ActionEvent::OnInternal(trigger), Arc::new(action)))
    }

    /// Build the state graph
    pub fn build(self) -> FsmResult<StateGraph<S, E>, S, E> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.graph),
        }
    }

    /// Build the state graph, ready to be shared between machines
    pub fn build_shared(self) -> FsmResult<Arc<StateGraph<S, E>>, S, E> {
        self.build().map(Arc::new)
    }
}
