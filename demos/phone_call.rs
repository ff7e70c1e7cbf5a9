//! Phone call state machine example
//!
//! A call goes off hook, rings, connects and can be placed on hold. While
//! connected (on hold included) the microphone can be muted and the volume
//! changed without leaving the state. The final graph is written as DOT.
//!
//! Run with `RUST_LOG=hierarchical_fsm=debug` to see every transition:
//!
//! ```sh
//! RUST_LOG=hierarchical_fsm=debug cargo run --example phone_call -- call.dot
//! dot -Tsvg call.dot -o call.svg
//! ```

use hierarchical_fsm::prelude::*;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum CallState {
    OffHook,
    Ringing,
    Connected,
    OnHold,
    PhoneDestroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum CallTrigger {
    CallDialed,
    CallConnected,
    LeftMessage,
    PlacedOnHold,
    TakenOffHold,
    PhoneHurledAgainstWall,
    MuteMicrophone,
    UnmuteMicrophone,
    SetVolume,
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for CallTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

fn build_graph() -> FsmResult<Arc<StateGraph<CallState, CallTrigger>>, CallState, CallTrigger> {
    use CallState::*;
    use CallTrigger::*;

    let started: Arc<Mutex<Option<Instant>>> = Arc::new(Mutex::new(None));
    let start_timer = {
        let started = Arc::clone(&started);
        move |_: &Transition<CallState, CallTrigger>| -> ActionResult {
            *started.lock().map_err(|_| "call timer poisoned")? = Some(Instant::now());
            println!("Call started");
            Ok(())
        }
    };
    let stop_timer = move |_: &Transition<CallState, CallTrigger>| -> ActionResult {
        let start = started.lock().map_err(|_| "call timer poisoned")?.take();
        match start {
            Some(start) => println!("Call ended after {:?}", start.elapsed()),
            None => println!("Call ended"),
        }
        Ok(())
    };

    StateGraphBuilder::new()
        .state(OffHook)
        .state(Ringing)
        .state(Connected)
        .substate(OnHold, Connected)
        .state(PhoneDestroyed)
        .trigger_parameter(CallDialed, ParamType::Text)
        .trigger_parameter(SetVolume, ParamType::Int)
        .permit(OffHook, CallDialed, Ringing)
        .on_entry_from(Ringing, CallDialed, |t| {
            println!("[Phone Call] placed for : [{}]", t.text_arg().unwrap_or_default());
            Ok(())
        })
        .permit(Ringing, CallConnected, Connected)
        .on_entry(Connected, start_timer)
        .on_exit(Connected, stop_timer)
        .internal_transition(Connected, MuteMicrophone, |_| {
            println!("Microphone muted!");
            Ok(())
        })
        .internal_transition(Connected, UnmuteMicrophone, |_| {
            println!("Microphone unmuted!");
            Ok(())
        })
        .internal_transition(Connected, SetVolume, |t| {
            println!("Volume set to {}!", t.int_arg().unwrap_or_default());
            Ok(())
        })
        .permit(Connected, LeftMessage, OffHook)
        .permit(Connected, PlacedOnHold, OnHold)
        .permit(OnHold, TakenOffHold, Connected)
        .permit(OnHold, PhoneHurledAgainstWall, PhoneDestroyed)
        .build_shared()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    use CallTrigger::*;

    let graph = build_graph()?;
    let call = StateMachine::new(Arc::clone(&graph), CallState::OffHook)?;

    call.fire_with(CallDialed, "alice")?;
    call.fire(CallConnected)?;
    call.fire_with(SetVolume, 2)?;
    call.fire(PlacedOnHold)?;
    call.fire(MuteMicrophone)?;
    call.fire(UnmuteMicrophone)?;
    call.fire(TakenOffHold)?;
    call.fire_with(SetVolume, 11)?;
    call.fire(PlacedOnHold)?;
    call.fire(PhoneHurledAgainstWall)?;

    println!("State is {}", call.current_state());

    let path = std::env::args().nth(1).unwrap_or_else(|| "phone_call.dot".to_string());
    std::fs::write(&path, graph.to_dot())?;
    println!("Graph written to {}", path);

    Ok(())
}
