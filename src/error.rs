//! Error types for the state machine

use std::fmt::{self, Debug};
use thiserror::Error;

use crate::value::ParamType;

/// Result type alias for state machine operations
pub type FsmResult<T, S, E> = std::result::Result<T, FsmError<S, E>>;

/// Error returned by a failing action callback
pub type ActionError = Box<dyn std::error::Error + Send + Sync>;

/// Which part of a transition an action belonged to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionPhase {
    /// Exit action of a state being left
    Exit,
    /// Entry action of a state being entered
    Entry,
    /// Handler of an internal transition
    Internal,
}

impl fmt::Display for ActionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            ActionPhase::Exit => "exit",
            ActionPhase::Entry => "entry",
            ActionPhase::Internal => "internal",
        };
        f.write_str(phase)
    }
}

fn describe_param(param: &Option<ParamType>) -> String {
    match param {
        Some(ty) => ty.to_string(),
        None => "no argument".to_string(),
    }
}

/// Errors that can occur while configuring a state graph or firing triggers
#[derive(Error, Debug)]
pub enum FsmError<S: Debug, E: Debug> {
    /// A state with this identifier is already registered
    #[error("State {0:?} already registered")]
    DuplicateState(S),

    /// Attempted to use a state that wasn't registered
    #[error("State {0:?} not registered")]
    UnknownState(S),

    /// The parent named for a substate wasn't registered
    #[error("Parent {parent:?} of state {state:?} not registered")]
    UnknownParent {
        /// State being configured
        state: S,
        /// Missing parent
        parent: S,
    },

    /// Re-parenting would make a state its own ancestor
    #[error("State {state:?} cannot be a substate of {parent:?}: hierarchy would contain a cycle")]
    CyclicHierarchy {
        /// State being re-parented
        state: S,
        /// Requested parent
        parent: S,
    },

    /// Trigger was never registered with the graph
    #[error("Trigger {0:?} not registered")]
    UnknownTrigger(E),

    /// The trigger's parameter can no longer change
    #[error("Trigger {trigger:?} already used with {}, cannot declare {requested}", describe_param(.current))]
    TriggerAlreadyUsed {
        /// Trigger being declared
        trigger: E,
        /// Parameter the trigger is already bound to
        current: Option<ParamType>,
        /// Parameter that was requested
        requested: ParamType,
    },

    /// A rule for this state and trigger already exists
    #[error("State {state:?} already has a transition for trigger {trigger:?}")]
    DuplicateTransition {
        /// Source state
        state: S,
        /// Trigger
        trigger: E,
    },

    /// Fired argument does not match the trigger's declared parameter
    #[error("Trigger {trigger:?} expects {}, got {}", describe_param(.expected), describe_param(.found))]
    ParameterMismatch {
        /// Fired trigger
        trigger: E,
        /// Declared parameter
        expected: Option<ParamType>,
        /// Parameter type of the supplied argument
        found: Option<ParamType>,
    },

    /// Neither the active state nor any of its ancestors permit the trigger
    #[error("Trigger {trigger:?} not permitted in state {state:?}")]
    TriggerNotPermitted {
        /// Active leaf state
        state: S,
        /// Fired trigger
        trigger: E,
    },

    /// The matching rule's guard rejected the fire request
    #[error("Trigger {trigger:?} in state {state:?} rejected by guard [{guard}]")]
    GuardRejected {
        /// State that defines the guarded rule
        state: S,
        /// Fired trigger
        trigger: E,
        /// Guard description
        guard: String,
    },

    /// An action callback returned an error
    #[error("State {state:?} {phase} action failed: {source}")]
    ActionFailed {
        /// State the action is bound to
        state: S,
        /// Part of the transition that failed
        phase: ActionPhase,
        /// Error returned by the callback
        #[source]
        source: ActionError,
    },
}

impl<S: Debug, E: Debug> FsmError<S, E> {
    /// True for errors raised while building a graph
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            FsmError::DuplicateState(_)
                | FsmError::UnknownState(_)
                | FsmError::UnknownParent { .. }
                | FsmError::CyclicHierarchy { .. }
                | FsmError::TriggerAlreadyUsed { .. }
                | FsmError::DuplicateTransition { .. }
        )
    }
}
