//! # Hierarchical State Machine
//!
//! A hierarchical finite state machine engine in Rust with parameterized
//! triggers, internal transitions, run-to-completion firing and deterministic
//! DOT/PlantUML graph export.
//!
//! ## Features
//!
//! - 🏗️ **Hierarchical States**: Substates inherit their ancestors' transitions
//! - 🎯 **Nearest Common Ancestor**: Exit and entry actions only run for the states actually left and entered
//! - 🧮 **Typed Trigger Parameters**: Argument types are fixed per trigger and checked on every fire
//! - 🔁 **Run-to-Completion**: Triggers fired from actions are queued, never nested
//! - 🧵 **Thread Safe**: One graph shared by many machines, fires serialized per machine
//! - 📊 **Graph Export**: Deterministic DOT output, PlantUML with the `plantuml` feature
//!
//! ## Quick Start
//!
//! ```rust
//! use hierarchical_fsm::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let graph = StateGraphBuilder::<&str, &str>::new()
//!     .state("Ringing")
//!     .state("Connected")
//!     .substate("OnHold", "Connected")
//!     .trigger_parameter("SetVolume", ParamType::Int)
//!     .permit("Ringing", "CallConnected", "Connected")
//!     .permit("Connected", "PlacedOnHold", "OnHold")
//!     .permit("OnHold", "TakenOffHold", "Connected")
//!     .internal_transition("Connected", "SetVolume", |t| {
//!         println!("Volume set to {:?}", t.int_arg());
//!         Ok(())
//!     })
//!     .on_entry("Connected", |_| {
//!         println!("Call started");
//!         Ok(())
//!     })
//!     .build_shared()?;
//!
//! let call = StateMachine::new(graph, "Ringing")?;
//! call.fire("CallConnected")?;
//! call.fire("PlacedOnHold")?;
//! call.fire_with("SetVolume", 2)?;
//! assert_eq!(call.current_state(), "OnHold");
//! assert!(call.is_in_state(&"Connected"));
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]

mod actions;
mod builder;
mod dot;
mod error;
mod fsm;
mod graph;
mod value;

#[cfg(feature = "plantuml")]
mod plantuml;

pub use actions::{Action, ActionEvent, ActionResult, Transition};
pub use builder::StateGraphBuilder;
pub use dot::export_graph;
pub use error::{ActionError, ActionPhase, FsmError, FsmResult};
pub use fsm::StateMachine;
pub use graph::{GuardFn, Identifier, StateGraph};
pub use value::{ParamType, Value};

#[cfg(feature = "plantuml")]
#[cfg_attr(docsrs, doc(cfg(feature = "plantuml")))]
pub use plantuml::export_plantuml;

pub mod prelude {
    //! Prelude module for convenient imports
    pub use crate::{
        ActionPhase, ActionResult, FsmError, FsmResult, ParamType, StateGraph, StateGraphBuilder,
        StateMachine, Transition, Value,
    };
}
