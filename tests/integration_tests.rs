use hierarchical_fsm::{
    ActionPhase, ActionResult, FsmError, ParamType, StateGraph, StateGraphBuilder, StateMachine, Transition,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum PhoneState {
    OffHook,
    Ringing,
    Connected,
    OnHold,
    PhoneDestroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum PhoneTrigger {
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

impl fmt::Display for PhoneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for PhoneTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Side effects of the phone's actions
#[derive(Debug, Default)]
struct Phone {
    callee: Mutex<Option<String>>,
    volume: Mutex<Option<i64>>,
    muted: Mutex<bool>,
    timer_started: AtomicUsize,
    timer_stopped: AtomicUsize,
    log: Mutex<Vec<String>>,
}

impl Phone {
    fn note(&self, entry: impl Into<String>) {
        self.log.lock().unwrap().push(entry.into());
    }
}

fn create_phone_graph(phone: &Arc<Phone>) -> Arc<StateGraph<PhoneState, PhoneTrigger>> {
    use PhoneState::*;
    use PhoneTrigger::*;

    let p = Arc::clone(phone);
    let on_dialed = move |t: &Transition<PhoneState, PhoneTrigger>| -> ActionResult {
        let callee = t.text_arg().ok_or("CallDialed without callee")?;
        *p.callee.lock().unwrap() = Some(callee.to_string());
        p.note(format!("dialed {}", callee));
        Ok(())
    };
    let p = Arc::clone(phone);
    let start_timer = move |_: &Transition<PhoneState, PhoneTrigger>| -> ActionResult {
        p.timer_started.fetch_add(1, Ordering::SeqCst);
        p.note("timer started");
        Ok(())
    };
    let p = Arc::clone(phone);
    let stop_timer = move |_: &Transition<PhoneState, PhoneTrigger>| -> ActionResult {
        p.timer_stopped.fetch_add(1, Ordering::SeqCst);
        p.note("timer stopped");
        Ok(())
    };
    let p = Arc::clone(phone);
    let on_mute = move |_: &Transition<PhoneState, PhoneTrigger>| -> ActionResult {
        *p.muted.lock().unwrap() = true;
        p.note("muted");
        Ok(())
    };
    let p = Arc::clone(phone);
    let on_unmute = move |_: &Transition<PhoneState, PhoneTrigger>| -> ActionResult {
        *p.muted.lock().unwrap() = false;
        p.note("unmuted");
        Ok(())
    };
    let p = Arc::clone(phone);
    let on_set_volume = move |t: &Transition<PhoneState, PhoneTrigger>| -> ActionResult {
        let volume = t.int_arg().ok_or("SetVolume without volume")?;
        *p.volume.lock().unwrap() = Some(volume);
        p.note(format!("volume {}", volume));
        Ok(())
    };

    StateGraphBuilder::new()
        .state(OffHook)
        .state(Ringing)
        .state(Connected)
        .substate(OnHold, Connected)
        .state(PhoneDestroyed)
        .trigger_parameter(SetVolume, ParamType::Int)
        .trigger_parameter(CallDialed, ParamType::Text)
        .permit(OffHook, CallDialed, Ringing)
        .on_entry_from(Ringing, CallDialed, on_dialed)
        .permit(Ringing, CallConnected, Connected)
        .on_entry(Connected, start_timer)
        .on_exit(Connected, stop_timer)
        .internal_transition(Connected, MuteMicrophone, on_mute)
        .internal_transition(Connected, UnmuteMicrophone, on_unmute)
        .internal_transition(Connected, SetVolume, on_set_volume)
        .permit(Connected, LeftMessage, OffHook)
        .permit(Connected, PlacedOnHold, OnHold)
        .permit(OnHold, TakenOffHold, Connected)
        .permit(OnHold, PhoneHurledAgainstWall, PhoneDestroyed)
        .build_shared()
        .unwrap()
}

fn create_phone() -> (StateMachine<PhoneState, PhoneTrigger>, Arc<Phone>) {
    let phone = Arc::new(Phone::default());
    let call = StateMachine::new(create_phone_graph(&phone), PhoneState::OffHook).unwrap();
    (call, phone)
}

#[test]
fn test_phone_call_lifecycle() {
    use PhoneState::*;
    use PhoneTrigger::*;

    let (call, phone) = create_phone();

    call.fire_with(CallDialed, "alice").unwrap();
    assert_eq!(call.current_state(), Ringing);
    assert_eq!(phone.callee.lock().unwrap().as_deref(), Some("alice"));

    call.fire(CallConnected).unwrap();
    assert_eq!(call.current_state(), Connected);

    call.fire_with(SetVolume, 2).unwrap();
    call.fire(PlacedOnHold).unwrap();
    assert_eq!(call.current_state(), OnHold);
    assert!(call.is_in_state(&Connected));

    // inherited from Connected while on hold
    call.fire(MuteMicrophone).unwrap();
    assert!(*phone.muted.lock().unwrap());
    call.fire(UnmuteMicrophone).unwrap();
    assert!(!*phone.muted.lock().unwrap());
    assert_eq!(call.current_state(), OnHold);

    call.fire(TakenOffHold).unwrap();
    assert_eq!(call.current_state(), Connected);
    call.fire_with(SetVolume, 11).unwrap();
    call.fire(PlacedOnHold).unwrap();

    assert_eq!(phone.timer_stopped.load(Ordering::SeqCst), 0);
    call.fire(PhoneHurledAgainstWall).unwrap();

    assert_eq!(call.current_state(), PhoneDestroyed);
    assert_eq!(phone.timer_started.load(Ordering::SeqCst), 1);
    assert_eq!(phone.timer_stopped.load(Ordering::SeqCst), 1);
    assert_eq!(*phone.volume.lock().unwrap(), Some(11));
    assert_eq!(
        *phone.log.lock().unwrap(),
        vec![
            "dialed alice",
            "timer started",
            "volume 2",
            "muted",
            "unmuted",
            "volume 11",
            "timer stopped",
        ]
    );
}

#[test]
fn test_hold_round_trip_never_touches_connected_actions() {
    use PhoneTrigger::*;

    let phone = Arc::new(Phone::default());
    let call = StateMachine::new(create_phone_graph(&phone), PhoneState::Connected).unwrap();

    for _ in 0..3 {
        call.fire(PlacedOnHold).unwrap();
        call.fire(TakenOffHold).unwrap();
    }
    assert_eq!(call.current_state(), PhoneState::Connected);
    assert_eq!(phone.timer_started.load(Ordering::SeqCst), 0);
    assert_eq!(phone.timer_stopped.load(Ordering::SeqCst), 0);

    call.fire(LeftMessage).unwrap();
    assert_eq!(call.current_state(), PhoneState::OffHook);
    assert_eq!(phone.timer_stopped.load(Ordering::SeqCst), 1);
}

#[test]
fn test_invalid_transitions() {
    use PhoneState::*;
    use PhoneTrigger::*;

    let (call, phone) = create_phone();

    let result = call.fire(CallConnected);
    assert!(matches!(
        result,
        Err(FsmError::TriggerNotPermitted { state: OffHook, trigger: CallConnected })
    ));
    assert_eq!(call.current_state(), OffHook);

    // internal transitions of Connected are not available outside it
    let result = call.fire(MuteMicrophone);
    assert!(matches!(result, Err(FsmError::TriggerNotPermitted { .. })));

    let result = call.fire(CallDialed);
    assert!(matches!(
        result,
        Err(FsmError::ParameterMismatch { expected: Some(ParamType::Text), found: None, .. })
    ));
    let result = call.fire_with(CallDialed, 42);
    assert!(matches!(
        result,
        Err(FsmError::ParameterMismatch { found: Some(ParamType::Int), .. })
    ));
    assert_eq!(call.current_state(), OffHook);
    assert!(phone.log.lock().unwrap().is_empty());
}

#[test]
fn test_unregistered_trigger_is_unknown() {
    let graph = StateGraphBuilder::<&str, &str>::new()
        .state("OffHook")
        .state("Ringing")
        .permit("OffHook", "CallDialed", "Ringing")
        .build_shared()
        .unwrap();
    let call = StateMachine::new(graph, "OffHook").unwrap();

    assert!(matches!(call.fire("Teleport"), Err(FsmError::UnknownTrigger("Teleport"))));
    assert_eq!(call.current_state(), "OffHook");
}

#[test]
fn test_permitted_triggers_follow_hierarchy() {
    use PhoneTrigger::*;

    let phone = Arc::new(Phone::default());
    let call = StateMachine::new(create_phone_graph(&phone), PhoneState::OnHold).unwrap();

    assert_eq!(
        call.permitted_triggers(),
        vec![
            LeftMessage,
            PlacedOnHold,
            TakenOffHold,
            PhoneHurledAgainstWall,
            MuteMicrophone,
            UnmuteMicrophone,
            SetVolume,
        ]
    );
    assert!(!call.can_fire(&SetVolume));
}

#[test]
fn test_graph_export() {
    let phone = Arc::new(Phone::default());
    let graph = create_phone_graph(&phone);
    let dot = graph.to_dot();

    let nodes = dot
        .lines()
        .filter(|l| l.trim_start().starts_with('"') && !l.contains("->"))
        .count();
    let edges = dot.lines().filter(|l| l.contains(" -> ")).count();
    assert_eq!(nodes, 5);
    assert_eq!(edges, 9);
    assert!(dot.contains("subgraph \"cluster_Connected\""));
    assert!(dot.contains("\"Connected\" -> \"Connected\" [label=\"SetVolume(int)\", style=\"dashed\"];"));
    assert!(dot.contains("\"OffHook\" -> \"Ringing\" [label=\"CallDialed(text)\"];"));
}

#[test]
fn test_failing_exit_action_aborts_transition() {
    let graph = StateGraphBuilder::<&str, &str>::new()
        .state("Connected")
        .substate("OnHold", "Connected")
        .state("PhoneDestroyed")
        .permit("OnHold", "PhoneHurledAgainstWall", "PhoneDestroyed")
        .on_exit("Connected", |_| Err("timer would not stop".into()))
        .on_entry("PhoneDestroyed", |_| panic!("must not be entered"))
        .build_shared()
        .unwrap();
    let call = StateMachine::new(graph, "OnHold").unwrap();

    match call.fire("PhoneHurledAgainstWall") {
        Err(FsmError::ActionFailed { state, phase, source }) => {
            assert_eq!(state, "Connected");
            assert_eq!(phase, ActionPhase::Exit);
            assert_eq!(source.to_string(), "timer would not stop");
        }
        other => panic!("Expected ActionFailed, got {:?}", other),
    }
    assert_eq!(call.current_state(), "OnHold");
}

#[test]
fn test_actions_can_fire_follow_up_triggers() {
    let slot: Arc<OnceLock<Weak<StateMachine<&'static str, &'static str>>>> = Arc::new(OnceLock::new());
    let order = Arc::new(Mutex::new(Vec::new()));

    let graph = StateGraphBuilder::<&str, &str>::new()
        .state("OffHook")
        .state("Ringing")
        .state("Connected")
        .permit("OffHook", "CallDialed", "Ringing")
        .permit("Ringing", "CallConnected", "Connected")
        .on_entry("Ringing", {
            let slot = Arc::clone(&slot);
            let order = Arc::clone(&order);
            move |_| {
                order.lock().unwrap().push("ringing");
                // auto-answer
                if let Some(call) = slot.get().and_then(Weak::upgrade) {
                    call.fire("CallConnected")?;
                }
                order.lock().unwrap().push("ringing done");
                Ok(())
            }
        })
        .on_entry("Connected", {
            let order = Arc::clone(&order);
            move |_| {
                order.lock().unwrap().push("connected");
                Ok(())
            }
        })
        .build_shared()
        .unwrap();
    let call = Arc::new(StateMachine::new(graph, "OffHook").unwrap());
    slot.set(Arc::downgrade(&call)).unwrap();

    call.fire("CallDialed").unwrap();
    assert_eq!(call.current_state(), "Connected");
    assert_eq!(*order.lock().unwrap(), vec!["ringing", "ringing done", "connected"]);
}

#[test]
fn test_machines_share_one_graph() {
    use PhoneState::*;
    use PhoneTrigger::*;

    let phone = Arc::new(Phone::default());
    let graph = create_phone_graph(&phone);
    let first = StateMachine::new(Arc::clone(&graph), OffHook).unwrap();
    let second = StateMachine::new(Arc::clone(&graph), Connected).unwrap();

    first.fire_with(CallDialed, "alice").unwrap();
    second.fire(PlacedOnHold).unwrap();

    assert_eq!(first.current_state(), Ringing);
    assert_eq!(second.current_state(), OnHold);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_operations() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let overlaps = Arc::new(AtomicUsize::new(0));

    let guard_action = {
        let in_flight = Arc::clone(&in_flight);
        let overlaps = Arc::clone(&overlaps);
        move |_: &Transition<&'static str, &'static str>| -> ActionResult {
            if in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
                overlaps.fetch_add(1, Ordering::SeqCst);
            }
            std::thread::sleep(Duration::from_micros(50));
            in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    };

    let graph = StateGraphBuilder::<&str, &str>::new()
        .state("Connected")
        .substate("OnHold", "Connected")
        .permit("Connected", "PlacedOnHold", "OnHold")
        .permit("OnHold", "TakenOffHold", "Connected")
        .internal_transition("Connected", "Ping", guard_action.clone())
        .on_entry("OnHold", guard_action.clone())
        .on_exit("OnHold", guard_action)
        .build_shared()
        .unwrap();
    let call = Arc::new(StateMachine::new(graph, "Connected").unwrap());

    let mut tasks = Vec::new();
    for worker in 0..4 {
        let call = Arc::clone(&call);
        tasks.push(tokio::task::spawn_blocking(move || {
            let mut outcomes: HashMap<&'static str, usize> = HashMap::new();
            for i in 0..50 {
                let trigger = match (worker + i) % 3 {
                    0 => "PlacedOnHold",
                    1 => "TakenOffHold",
                    _ => "Ping",
                };
                let outcome = match call.fire(trigger) {
                    Ok(()) => "ok",
                    Err(FsmError::TriggerNotPermitted { .. }) => "not permitted",
                    Err(e) => panic!("unexpected error: {}", e),
                };
                *outcomes.entry(outcome).or_default() += 1;
            }
            outcomes
        }));
    }

    let mut total = 0;
    for task in tasks {
        total += task.await.unwrap().values().sum::<usize>();
    }

    assert_eq!(total, 200);
    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    assert!(matches!(call.current_state(), "Connected" | "OnHold"));
}
