//! State graph definition
//!
//! A [`StateGraph`] holds every state, trigger, transition rule and action
//! binding of a machine. States live in an arena and refer to their parent by
//! handle, so the hierarchy is a forest walked by index rather than by
//! reference. The graph is configured once and then shared read-only by any
//! number of [`StateMachine`](crate::StateMachine)s.

use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::iter;
use std::sync::Arc;

use tracing::trace;

use crate::actions::{Action, ActionEvent, ActionRegistry, Transition};
use crate::error::{ActionError, FsmError, FsmResult};
use crate::value::{ParamType, Value};

/// Bounds shared by state and trigger identifiers
pub trait Identifier: Clone + Debug + Display + Eq + Hash + Ord + Send + Sync + 'static {}

impl<T> Identifier for T where T: Clone + Debug + Display + Eq + Hash + Ord + Send + Sync + 'static {}

/// Predicate deciding whether a rule applies to the fired argument
pub type GuardFn = Arc<dyn Fn(Option<&Value>) -> bool + Send + Sync>;

/// Guard attached to a transition rule
#[derive(Clone)]
pub(crate) struct Guard {
    pub(crate) description: String,
    predicate: GuardFn,
}

impl Guard {
    pub(crate) fn allows(&self, arg: Option<&Value>) -> bool {
        (self.predicate)(arg)
    }
}

/// What a rule does once it matches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RuleKind {
    /// Leave the source and enter the target (arena handle)
    External(usize),
    /// Run the internal handler, stay put
    Internal,
}

#[derive(Clone)]
pub(crate) struct TransitionRule {
    pub(crate) kind: RuleKind,
    pub(crate) guard: Option<Guard>,
}

struct StateNode<S, E> {
    id: S,
    parent: Option<usize>,
    rules: HashMap<E, TransitionRule>,
}

#[derive(Debug, Default)]
struct TriggerInfo {
    param: Option<ParamType>,
    rules: usize,
}

/// Immutable-after-build definition of a hierarchical state machine
pub struct StateGraph<S, E> {
    states: Vec<StateNode<S, E>>,
    index: HashMap<S, usize>,
    triggers: HashMap<E, TriggerInfo>,
    actions: ActionRegistry<S, E>,
}

impl<S: Identifier, E: Identifier> Default for StateGraph<S, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Identifier, E: Identifier> StateGraph<S, E> {
    /// Create an empty graph
    pub fn new() -> Self {
        Self {
            states: Vec::new(),
            index: HashMap::new(),
            triggers: HashMap::new(),
            actions: ActionRegistry::new(),
        }
    }

    // ---- configuration -------------------------------------------------

    /// Register a top-level state
    pub fn add_state(&mut self, id: S) -> FsmResult<(), S, E> {
        self.insert_state(id, None)
    }

    /// Register a state as a substate of an already registered `parent`
    pub fn add_substate(&mut self, id: S, parent: S) -> FsmResult<(), S, E> {
        self.insert_state(id, Some(parent))
    }

    fn insert_state(&mut self, id: S, parent: Option<S>) -> FsmResult<(), S, E> {
        if self.index.contains_key(&id) {
            return Err(FsmError::DuplicateState(id));
        }
        let parent = match parent {
            Some(parent) => match self.index.get(&parent) {
                Some(&handle) => Some(handle),
                None => return Err(FsmError::UnknownParent { state: id, parent }),
            },
            None => None,
        };

        trace!(state = %id, parent = ?parent.map(|p| &self.states[p].id), "registered state");
        let handle = self.states.len();
        self.index.insert(id.clone(), handle);
        self.states.push(StateNode {
            id,
            parent,
            rules: HashMap::new(),
        });
        self.actions.add_state();
        Ok(())
    }

    /// Move a registered state under a new parent.
    ///
    /// Fails with [`FsmError::CyclicHierarchy`] when `parent` is `id` itself
    /// or one of its descendants.
    pub fn set_parent(&mut self, id: S, parent: S) -> FsmResult<(), S, E> {
        let handle = self.handle(&id)?;
        let parent_handle = match self.index.get(&parent) {
            Some(&handle) => handle,
            None => return Err(FsmError::UnknownParent { state: id, parent }),
        };
        if self.ancestors(parent_handle).any(|a| a == handle) {
            return Err(FsmError::CyclicHierarchy { state: id, parent });
        }
        trace!(state = %id, parent = %parent, "re-parented state");
        self.states[handle].parent = Some(parent_handle);
        Ok(())
    }

    /// Fix the parameter type of `trigger`.
    ///
    /// Declaring the same type twice is a no-op. A trigger that already has
    /// rules without a parameter, or was declared with another type, fails
    /// with [`FsmError::TriggerAlreadyUsed`].
    pub fn declare_trigger_parameter(&mut self, trigger: E, param: ParamType) -> FsmResult<(), S, E> {
        match self.triggers.get(&trigger) {
            Some(info) if info.param == Some(param) => Ok(()),
            Some(info) => Err(FsmError::TriggerAlreadyUsed {
                current: info.param,
                trigger,
                requested: param,
            }),
            None => {
                trace!(trigger = %trigger, param = %param, "declared trigger parameter");
                self.triggers.insert(
                    trigger,
                    TriggerInfo {
                        param: Some(param),
                        rules: 0,
                    },
                );
                Ok(())
            }
        }
    }

    /// Allow `trigger` to move `state` to `target`
    pub fn permit(&mut self, state: S, trigger: E, target: S) -> FsmResult<(), S, E> {
        let target = self.handle(&target)?;
        self.insert_rule(state, trigger, RuleKind::External(target), None)
    }

    /// Like [`permit`](Self::permit), but the rule only applies while `guard`
    /// accepts the fired argument
    pub fn permit_if<G>(
        &mut self,
        state: S,
        trigger: E,
        target: S,
        description: impl Into<String>,
        guard: G,
    ) -> FsmResult<(), S, E>
    where
        G: Fn(Option<&Value>) -> bool + Send + Sync + 'static,
    {
        let target = self.handle(&target)?;
        let guard = Guard {
            description: description.into(),
            predicate: Arc::new(guard),
        };
        self.insert_rule(state, trigger, RuleKind::External(target), Some(guard))
    }

    /// Handle `trigger` in `state` without leaving it
    pub fn permit_internal(&mut self, state: S, trigger: E) -> FsmResult<(), S, E> {
        self.insert_rule(state, trigger, RuleKind::Internal, None)
    }

    /// [`permit_internal`](Self::permit_internal) plus its handler
    pub fn internal_transition<F>(&mut self, state: S, trigger: E, action: F) -> FsmResult<(), S, E>
    where
        F: Fn(&Transition<S, E>) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        self.permit_internal(state.clone(), trigger.clone())?;
        self.bind_internal(state, trigger, action)
    }

    fn insert_rule(
        &mut self,
        state: S,
        trigger: E,
        kind: RuleKind,
        guard: Option<Guard>,
    ) -> FsmResult<(), S, E> {
        let handle = self.handle(&state)?;
        if self.states[handle].rules.contains_key(&trigger) {
            return Err(FsmError::DuplicateTransition { state, trigger });
        }

        trace!(state = %state, trigger = %trigger, ?kind, "registered rule");
        self.triggers.entry(trigger.clone()).or_default().rules += 1;
        self.states[handle]
            .rules
            .insert(trigger, TransitionRule { kind, guard });
        Ok(())
    }

    /// Attach an action to a lifecycle event of `state`
    pub fn bind(&mut self, state: S, event: ActionEvent<E>, action: Action<S, E>) -> FsmResult<(), S, E> {
        let handle = self.handle(&state)?;
        if let ActionEvent::OnEntryFrom(trigger) | ActionEvent::OnInternal(trigger) = &event {
            if !self.triggers.contains_key(trigger) {
                return Err(FsmError::UnknownTrigger(trigger.clone()));
            }
        }
        trace!(state = %state, ?event, "bound action");
        self.actions.bind(handle, event, action);
        Ok(())
    }

    /// Run `action` on every entry into `state`
    pub fn bind_entry<F>(&mut self, state: S, action: F) -> FsmResult<(), S, E>
    where
        F: Fn(&Transition<S, E>) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        self.bind(state, ActionEvent::OnEntry, Arc::new(action))
    }

    /// Run `action` when `state` is entered because of `trigger`
    pub fn bind_entry_from<F>(&mut self, state: S, trigger: E, action: F) -> FsmResult<(), S, E>
    where
        F: Fn(&Transition<S, E>) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        self.bind(state, ActionEvent::OnEntryFrom(trigger), Arc::new(action))
    }

    /// Run `action` on every exit from `state`
    pub fn bind_exit<F>(&mut self, state: S, action: F) -> FsmResult<(), S, E>
    where
        F: Fn(&Transition<S, E>) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        self.bind(state, ActionEvent::OnExit, Arc::new(action))
    }

    /// Run `action` when `state` handles `trigger` as an internal transition
    pub fn bind_internal<F>(&mut self, state: S, trigger: E, action: F) -> FsmResult<(), S, E>
    where
        F: Fn(&Transition<S, E>) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        self.bind(state, ActionEvent::OnInternal(trigger), Arc::new(action))
    }

    // ---- introspection -------------------------------------------------

    /// Whether `state` is registered
    pub fn contains_state(&self, state: &S) -> bool {
        self.index.contains_key(state)
    }

    /// Whether `trigger` is registered
    pub fn contains_trigger(&self, trigger: &E) -> bool {
        self.triggers.contains_key(trigger)
    }

    /// Parent of `state`, if it is a substate
    pub fn parent(&self, state: &S) -> Option<&S> {
        let handle = *self.index.get(state)?;
        self.states[handle].parent.map(|p| &self.states[p].id)
    }

    /// Direct substates of `state`, sorted
    pub fn substates(&self, state: &S) -> Vec<&S> {
        let Some(&handle) = self.index.get(state) else {
            return Vec::new();
        };
        let mut children: Vec<&S> = self
            .states
            .iter()
            .filter(|node| node.parent == Some(handle))
            .map(|node| &node.id)
            .collect();
        children.sort();
        children
    }

    /// All states, sorted
    pub fn states(&self) -> Vec<&S> {
        let mut states: Vec<&S> = self.states.iter().map(|node| &node.id).collect();
        states.sort();
        states
    }

    /// All registered triggers, sorted
    pub fn triggers(&self) -> Vec<&E> {
        let mut triggers: Vec<&E> = self.triggers.keys().collect();
        triggers.sort();
        triggers
    }

    /// Declared parameter of `trigger`
    pub fn trigger_parameter(&self, trigger: &E) -> Option<ParamType> {
        self.triggers.get(trigger).and_then(|info| info.param)
    }

    /// Number of registered states
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Number of transition rules, external and internal
    pub fn transition_count(&self) -> usize {
        self.states.iter().map(|node| node.rules.len()).sum()
    }

    // ---- crate internals ------------------------------------------------

    pub(crate) fn handle(&self, state: &S) -> FsmResult<usize, S, E> {
        self.index
            .get(state)
            .copied()
            .ok_or_else(|| FsmError::UnknownState(state.clone()))
    }

    pub(crate) fn id(&self, handle: usize) -> &S {
        &self.states[handle].id
    }

    /// `handle` followed by its ancestors, leaf to root
    pub(crate) fn ancestors(&self, handle: usize) -> impl Iterator<Item = usize> + '_ {
        iter::successors(Some(handle), move |&h| self.states[h].parent)
    }

    /// Check that `trigger` exists and `arg` fits its declaration
    pub(crate) fn validate_argument(&self, trigger: &E, arg: Option<&Value>) -> FsmResult<(), S, E> {
        let info = self
            .triggers
            .get(trigger)
            .ok_or_else(|| FsmError::UnknownTrigger(trigger.clone()))?;
        let found = arg.map(Value::param_type);
        if info.param != found {
            return Err(FsmError::ParameterMismatch {
                trigger: trigger.clone(),
                expected: info.param,
                found,
            });
        }
        Ok(())
    }

    /// Nearest state on the ancestor chain of `handle` with a rule for
    /// `trigger`, together with that rule
    pub(crate) fn resolve(&self, handle: usize, trigger: &E) -> Option<(usize, &TransitionRule)> {
        self.ancestors(handle)
            .find_map(|h| self.states[h].rules.get(trigger).map(|rule| (h, rule)))
    }

    /// Deepest common ancestor of two states, `None` for disjoint trees
    pub(crate) fn common_ancestor(&self, a: usize, b: usize) -> Option<usize> {
        let chain: Vec<usize> = self.ancestors(a).collect();
        self.ancestors(b).find(|h| chain.contains(h))
    }

    /// States to exit (leaf to root) and enter (root to leaf) when moving
    /// from `source` to `target`. A self-transition exits and re-enters.
    pub(crate) fn transition_path(&self, source: usize, target: usize) -> (Vec<usize>, Vec<usize>) {
        if source == target {
            return (vec![source], vec![source]);
        }
        let lca = self.common_ancestor(source, target);
        let exits = self
            .ancestors(source)
            .take_while(|&h| Some(h) != lca)
            .collect();
        let mut entries: Vec<usize> = self
            .ancestors(target)
            .take_while(|&h| Some(h) != lca)
            .collect();
        entries.reverse();
        (exits, entries)
    }

    pub(crate) fn actions(&self) -> &ActionRegistry<S, E> {
        &self.actions
    }

    /// Rules defined directly on `handle`, sorted by trigger
    pub(crate) fn rules_of(&self, handle: usize) -> Vec<(&E, &TransitionRule)> {
        let mut rules: Vec<(&E, &TransitionRule)> = self.states[handle].rules.iter().collect();
        rules.sort_by(|a, b| a.0.cmp(b.0));
        rules
    }

    /// Top-level states, sorted
    pub(crate) fn roots(&self) -> Vec<usize> {
        let mut roots: Vec<usize> = (0..self.states.len())
            .filter(|&h| self.states[h].parent.is_none())
            .collect();
        roots.sort_by(|&a, &b| self.states[a].id.cmp(&self.states[b].id));
        roots
    }

    /// Direct substates of `handle`, sorted
    pub(crate) fn children(&self, handle: usize) -> Vec<usize> {
        let mut children: Vec<usize> = (0..self.states.len())
            .filter(|&h| self.states[h].parent == Some(handle))
            .collect();
        children.sort_by(|&a, &b| self.states[a].id.cmp(&self.states[b].id));
        children
    }
}

impl<S: Identifier, E: Identifier> Debug for StateGraph<S, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateGraph")
            .field("states", &self.states())
            .field("triggers", &self.triggers())
            .field("transitions", &self.transition_count())
            .finish()
    }
}
