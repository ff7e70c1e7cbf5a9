//! State machine instances and trigger dispatch

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use tracing::{debug, trace, warn};

use crate::actions::{Action, Transition};
use crate::error::{ActionPhase, FsmError, FsmResult};
use crate::graph::{Identifier, RuleKind, StateGraph};
use crate::value::Value;

struct Request<E> {
    trigger: E,
    arg: Option<Value>,
}

struct Runtime<E> {
    current: usize,
    queue: VecDeque<Request<E>>,
    firing: bool,
}

/// Clears the firing flag when the outermost fire returns or unwinds.
/// Requests still queued at that point belong to a failed run and are dropped.
struct FiringScope<'a, E: fmt::Debug> {
    runtime: &'a RefCell<Runtime<E>>,
}

impl<E: fmt::Debug> Drop for FiringScope<'_, E> {
    fn drop(&mut self) {
        let mut runtime = self.runtime.borrow_mut();
        if !runtime.queue.is_empty() {
            let dropped: Vec<&E> = runtime.queue.iter().map(|r| &r.trigger).collect();
            warn!(?dropped, "discarding queued triggers after failed transition");
            runtime.queue.clear();
        }
        runtime.firing = false;
    }
}

/// A hierarchical finite state machine instance bound to a shared [`StateGraph`].
///
/// # Type Parameters
/// - `S`: State identifier type (see [`Identifier`]).
/// - `E`: Trigger identifier type (see [`Identifier`]).
///
/// # Firing
/// [`StateMachine::fire`] resolves a trigger against the active state and its
/// ancestors, runs exit actions leaf-to-root up to the common ancestor of
/// source and target, switches the active state, then runs entry actions
/// root-to-leaf. Internal transitions run only their handler.
///
/// # Run-to-completion
/// Fires are serialized by a re-entrant lock. A fire issued from inside an
/// action on the same thread is queued and processed after the current
/// transition; the outermost call returns once the queue is drained. Fires
/// from other threads wait for the lock.
///
/// # Errors
/// Every method returns [`FsmError`] on failure. `UnknownTrigger`,
/// `ParameterMismatch`, `TriggerNotPermitted` and `GuardRejected` leave the
/// active state untouched. A failing exit action leaves the machine in the
/// source state; a failing entry action leaves it in the target state.
///
/// # See Also
/// - [`StateGraph`]: the shared definition.
/// - [`Transition`]: what actions receive.
pub struct StateMachine<S, E> {
    graph: Arc<StateGraph<S, E>>,
    runtime: ReentrantMutex<RefCell<Runtime<E>>>,
}

impl<S: Identifier, E: Identifier> StateMachine<S, E> {
    /// Create a machine over `graph`, starting in `initial`. No actions run.
    pub fn new(graph: Arc<StateGraph<S, E>>, initial: S) -> FsmResult<Self, S, E> {
        let current = graph.handle(&initial)?;
        Ok(Self {
            graph,
            runtime: ReentrantMutex::new(RefCell::new(Runtime {
                current,
                queue: VecDeque::new(),
                firing: false,
            })),
        })
    }

    /// The shared graph definition
    pub fn graph(&self) -> &Arc<StateGraph<S, E>> {
        &self.graph
    }

    /// Get the current (leaf) state
    pub fn current_state(&self) -> S {
        let guard = self.runtime.lock();
        let current = guard.borrow().current;
        self.graph.id(current).clone()
    }

    /// True if `state` is the active leaf or one of its ancestors
    pub fn is_in_state(&self, state: &S) -> bool {
        let Ok(wanted) = self.graph.handle(state) else {
            return false;
        };
        let current = self.current_handle();
        self.graph.ancestors(current).any(|h| h == wanted)
    }

    /// Whether firing `trigger` without an argument would be accepted now
    pub fn can_fire(&self, trigger: &E) -> bool {
        self.can_fire_with(trigger, None)
    }

    /// Whether firing `trigger` with `arg` would be accepted now
    pub fn can_fire_with(&self, trigger: &E, arg: Option<&Value>) -> bool {
        if self.graph.validate_argument(trigger, arg).is_err() {
            return false;
        }
        match self.graph.resolve(self.current_handle(), trigger) {
            Some((_, rule)) => rule.guard.as_ref().map_or(true, |g| g.allows(arg)),
            None => false,
        }
    }

    /// Triggers with a rule on the active state or an ancestor, sorted.
    /// Guards are evaluated without an argument.
    pub fn permitted_triggers(&self) -> Vec<E> {
        let current = self.current_handle();
        let mut triggers: Vec<E> = self
            .graph
            .ancestors(current)
            .flat_map(|h| self.graph.rules_of(h))
            .filter(|(_, rule)| rule.guard.as_ref().map_or(true, |g| g.allows(None)))
            .map(|(trigger, _)| trigger.clone())
            .collect();
        triggers.sort();
        triggers.dedup();
        triggers
    }

    /// Fire a trigger that takes no argument
    pub fn fire(&self, trigger: E) -> FsmResult<(), S, E> {
        self.fire_with_arg(trigger, None)
    }

    /// Fire a parameterized trigger
    pub fn fire_with(&self, trigger: E, arg: impl Into<Value>) -> FsmResult<(), S, E> {
        self.fire_with_arg(trigger, Some(arg.into()))
    }

    /// Fire a trigger with an optional argument.
    ///
    /// The trigger and argument are validated before anything else. Called
    /// from inside an action, the request is queued and `Ok(())` returned;
    /// its outcome is reported to the outermost caller.
    pub fn fire_with_arg(&self, trigger: E, arg: Option<Value>) -> FsmResult<(), S, E> {
        self.graph.validate_argument(&trigger, arg.as_ref())?;

        let guard = self.runtime.lock();
        let runtime: &RefCell<Runtime<E>> = &guard;
        {
            let mut rt = runtime.borrow_mut();
            rt.queue.push_back(Request { trigger, arg });
            if rt.firing {
                trace!(pending = rt.queue.len(), "queued trigger behind running transition");
                return Ok(());
            }
            rt.firing = true;
        }

        let _scope = FiringScope { runtime };
        loop {
            let next = runtime.borrow_mut().queue.pop_front();
            match next {
                Some(request) => self.process(runtime, request)?,
                None => return Ok(()),
            }
        }
    }

    fn current_handle(&self) -> usize {
        let guard = self.runtime.lock();
        let current = guard.borrow().current;
        current
    }

    /// Resolve and execute a single request
    fn process(&self, runtime: &RefCell<Runtime<E>>, request: Request<E>) -> FsmResult<(), S, E> {
        let Request { trigger, arg } = request;
        let source = runtime.borrow().current;
        let graph = &*self.graph;

        let (holder, rule) = graph.resolve(source, &trigger).ok_or_else(|| {
            FsmError::TriggerNotPermitted {
                state: graph.id(source).clone(),
                trigger: trigger.clone(),
            }
        })?;

        if let Some(guard) = &rule.guard {
            if !guard.allows(arg.as_ref()) {
                return Err(FsmError::GuardRejected {
                    state: graph.id(holder).clone(),
                    trigger,
                    guard: guard.description.clone(),
                });
            }
        }

        match rule.kind {
            RuleKind::Internal => {
                let transition = Transition {
                    source: graph.id(source).clone(),
                    destination: graph.id(source).clone(),
                    trigger,
                    arg,
                };
                debug!(state = %transition.source, trigger = %transition.trigger, "internal transition");
                let actions = graph.actions().internal_actions(holder, &transition.trigger);
                self.run_actions(actions, holder, ActionPhase::Internal, &transition)
            }
            RuleKind::External(target) => {
                let transition = Transition {
                    source: graph.id(source).clone(),
                    destination: graph.id(target).clone(),
                    trigger,
                    arg,
                };
                debug!(
                    from = %transition.source,
                    to = %transition.destination,
                    trigger = %transition.trigger,
                    "transition"
                );

                let (exits, entries) = graph.transition_path(source, target);
                for state in exits {
                    let actions = graph.actions().exit_actions(state);
                    self.run_actions(actions, state, ActionPhase::Exit, &transition)?;
                }

                runtime.borrow_mut().current = target;

                for state in entries {
                    let from = (state == target).then_some(&transition.trigger);
                    let actions = graph.actions().entry_actions(state, from);
                    self.run_actions(actions, state, ActionPhase::Entry, &transition)?;
                }
                Ok(())
            }
        }
    }

    fn run_actions(
        &self,
        actions: &[Action<S, E>],
        state: usize,
        phase: ActionPhase,
        transition: &Transition<S, E>,
    ) -> FsmResult<(), S, E> {
        for action in actions {
            trace!(state = %self.graph.id(state), %phase, "running action");
            if let Err(source) = action(transition) {
                let state = self.graph.id(state).clone();
                warn!(state = %state, %phase, error = %source, "action failed");
                return Err(FsmError::ActionFailed {
                    state,
                    phase,
                    source,
                });
            }
        }
        Ok(())
    }
}

impl<S: Identifier, E: Identifier> fmt::Debug for StateMachine<S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("current_state", &self.current_state())
            .finish_non_exhaustive()
    }
}
