use application::registry::ThingRegistry;
use application::rules::engine::{RuleEngine, RuleInput, SimulatedUpdate};
use async_trait::async_trait;
use domain::{
    ActionRequest, ChangeEvent, CommandDispatcher, PropertyValue, RuleSettings, ThingDescriptor,
    ThingId, ThingKind,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

// Records every dispatch instead of hitting the network.
struct RecordingDispatcher {
    calls: Mutex<Vec<(ThingId, ActionRequest)>>,
}

impl RecordingDispatcher {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
        })
    }

    fn count(&self, thing_id: &ThingId, action: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, request)| id == thing_id && request.name == action)
            .count()
    }

    fn total(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn last(&self) -> Option<(ThingId, ActionRequest)> {
        self.calls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl CommandDispatcher for RecordingDispatcher {
    async fn dispatch(&self, target: &ThingDescriptor, request: &ActionRequest) {
        self.calls
            .lock()
            .unwrap()
            .push((target.id.clone(), request.clone()));
    }
}

struct Fixture {
    engine: RuleEngine,
    dispatcher: Arc<RecordingDispatcher>,
    feedback_rx: mpsc::Receiver<SimulatedUpdate>,
    lamp: ThingDescriptor,
    motion: ThingDescriptor,
    thermostat: ThingDescriptor,
}

fn setup() -> Fixture {
    let registry = Arc::new(ThingRegistry::new());
    let lamp = registry.register("Lamp".into(), ThingKind::Lamp, "http://localhost:3001".into());
    let thermostat = registry.register(
        "Thermostat".into(),
        ThingKind::Thermostat,
        "http://localhost:3002".into(),
    );
    let motion = registry.register(
        "Motion Sensor".into(),
        ThingKind::MotionSensor,
        "http://localhost:3003".into(),
    );

    let dispatcher = RecordingDispatcher::new();
    let (feedback_tx, feedback_rx) = mpsc::channel(16);
    let engine = RuleEngine::new(
        RuleSettings::default(),
        registry,
        dispatcher.clone(),
        feedback_tx,
    );

    Fixture {
        engine,
        dispatcher,
        feedback_rx,
        lamp,
        motion,
        thermostat,
    }
}

fn change(source: &ThingDescriptor, key: &str, value: PropertyValue) -> RuleInput {
    RuleInput::Change(ChangeEvent::new(
        source.id.clone(),
        source.kind,
        key.to_string(),
        value,
    ))
}

// Lets spawned timer tasks run after the paused clock advanced.
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_motion_turns_lamp_on_and_schedules_auto_off() {
    let mut f = setup();

    f.engine
        .handle(change(&f.motion, "motion", PropertyValue::Bool(true)))
        .await;

    assert_eq!(f.dispatcher.count(&f.lamp.id, "turnOn"), 1);
    assert_eq!(f.dispatcher.count(&f.lamp.id, "turnOff"), 0);

    tokio::time::advance(Duration::from_millis(2_100)).await;
    settle().await;

    assert_eq!(f.dispatcher.count(&f.lamp.id, "turnOff"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_motion_while_lamp_on_triggers_no_extra_turn_on() {
    let mut f = setup();

    f.engine
        .handle(change(&f.motion, "motion", PropertyValue::Bool(true)))
        .await;
    // Lamp confirms it is on via its own propagated change.
    f.engine
        .handle(change(&f.lamp, "on", PropertyValue::Bool(true)))
        .await;
    f.engine
        .handle(change(&f.motion, "motion", PropertyValue::Bool(true)))
        .await;

    assert_eq!(f.dispatcher.count(&f.lamp.id, "turnOn"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_new_motion_resets_pending_auto_off() {
    let mut f = setup();

    f.engine
        .handle(change(&f.motion, "motion", PropertyValue::Bool(true)))
        .await;
    tokio::time::advance(Duration::from_millis(1_500)).await;
    settle().await;

    // Second motion before the first auto-off elapses: the pending timer is
    // replaced, not stacked.
    f.engine
        .handle(change(&f.motion, "motion", PropertyValue::Bool(true)))
        .await;
    tokio::time::advance(Duration::from_millis(1_000)).await;
    settle().await;
    assert_eq!(
        f.dispatcher.count(&f.lamp.id, "turnOff"),
        0,
        "old timer must not fire after being superseded"
    );

    tokio::time::advance(Duration::from_millis(1_100)).await;
    settle().await;
    assert_eq!(f.dispatcher.count(&f.lamp.id, "turnOff"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_manual_override_suppresses_rules_within_cooldown() {
    let mut f = setup();

    f.engine
        .handle(change(&f.thermostat, "mode", PropertyValue::from("manual")))
        .await;

    // Any event within the cooldown window dispatches nothing.
    f.engine
        .handle(change(&f.motion, "motion", PropertyValue::Bool(true)))
        .await;
    f.engine
        .handle(change(&f.thermostat, "currentTemperature", PropertyValue::Number(16.0)))
        .await;
    assert_eq!(f.dispatcher.total(), 0);

    // Once the cooldown expires, automation resumes.
    tokio::time::advance(Duration::from_millis(30_100)).await;
    settle().await;
    f.engine
        .handle(change(&f.motion, "motion", PropertyValue::Bool(true)))
        .await;
    assert_eq!(f.dispatcher.count(&f.lamp.id, "turnOn"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cold_plus_presence_switches_to_comfort() {
    let mut f = setup();

    // Lamp is on so motion does not add unrelated dispatches.
    f.engine
        .handle(change(&f.lamp, "on", PropertyValue::Bool(true)))
        .await;
    f.engine
        .handle(change(&f.thermostat, "mode", PropertyValue::from("eco")))
        .await;
    f.engine
        .handle(change(&f.motion, "motion", PropertyValue::Bool(true)))
        .await;

    f.engine
        .handle(change(&f.thermostat, "currentTemperature", PropertyValue::Number(17.5)))
        .await;

    assert_eq!(f.dispatcher.count(&f.thermostat.id, "setMode"), 1);
    let (_, request) = f.dispatcher.last().unwrap();
    assert_eq!(request.params, json!({ "mode": "comfort" }));
}

#[tokio::test(start_paused = true)]
async fn test_cold_reading_without_presence_or_already_comfort_is_ignored() {
    let mut f = setup();

    // Cold but nobody present.
    f.engine
        .handle(change(&f.thermostat, "currentTemperature", PropertyValue::Number(17.0)))
        .await;
    assert_eq!(f.dispatcher.total(), 0);

    // Present, but mode is already comfort (the default).
    f.engine
        .handle(change(&f.lamp, "on", PropertyValue::Bool(true)))
        .await;
    f.engine
        .handle(change(&f.motion, "motion", PropertyValue::Bool(true)))
        .await;
    f.engine
        .handle(change(&f.thermostat, "currentTemperature", PropertyValue::Number(17.0)))
        .await;
    assert_eq!(f.dispatcher.count(&f.thermostat.id, "setMode"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_env_tick_is_silent_once_converged() {
    let mut f = setup();

    // Default mode is comfort (goal 19.0); converge the simulated reading.
    f.engine
        .handle(change(&f.thermostat, "currentTemperature", PropertyValue::Number(19.0)))
        .await;

    f.engine.handle(RuleInput::EnvTick).await;
    f.engine.handle(RuleInput::EnvTick).await;

    assert!(
        f.feedback_rx.try_recv().is_err(),
        "converged ticks must not emit updates"
    );
}

#[tokio::test(start_paused = true)]
async fn test_env_tick_heats_toward_comfort_target() {
    let mut f = setup();

    f.engine
        .handle(change(&f.thermostat, "currentTemperature", PropertyValue::Number(18.0)))
        .await;
    f.engine.handle(RuleInput::EnvTick).await;

    let update = f.feedback_rx.try_recv().unwrap();
    assert_eq!(update.thing_id, f.thermostat.id);
    assert_eq!(
        update.properties,
        vec![
            ("currentTemperature".to_string(), PropertyValue::Number(18.1)),
            ("heating".to_string(), PropertyValue::Bool(true)),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_env_tick_decays_passively_when_off() {
    let mut f = setup();

    f.engine
        .handle(change(&f.thermostat, "mode", PropertyValue::from("off")))
        .await;
    f.engine
        .handle(change(&f.thermostat, "currentTemperature", PropertyValue::Number(16.0)))
        .await;
    f.engine.handle(RuleInput::EnvTick).await;

    let update = f.feedback_rx.try_recv().unwrap();
    assert_eq!(
        update.properties[0],
        ("currentTemperature".to_string(), PropertyValue::Number(15.95))
    );
    assert_eq!(
        update.properties[1],
        ("heating".to_string(), PropertyValue::Bool(false))
    );

    // At the floor, decay stops.
    f.engine
        .handle(change(&f.thermostat, "currentTemperature", PropertyValue::Number(15.0)))
        .await;
    f.engine
        .handle(change(&f.thermostat, "heating", PropertyValue::Bool(false)))
        .await;
    f.engine.handle(RuleInput::EnvTick).await;
    assert!(f.feedback_rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_inactivity_turns_lamp_off_and_thermostat_eco() {
    let mut f = setup();

    f.engine
        .handle(change(&f.lamp, "on", PropertyValue::Bool(true)))
        .await;
    f.engine
        .handle(change(&f.motion, "motion", PropertyValue::Bool(true)))
        .await;
    f.engine
        .handle(change(&f.motion, "motion", PropertyValue::Bool(false)))
        .await;

    // Not idle yet.
    tokio::time::advance(Duration::from_secs(299)).await;
    f.engine.handle(RuleInput::InactivityTick).await;
    assert_eq!(f.dispatcher.count(&f.lamp.id, "turnOff"), 0);

    // Past the threshold: fires, and repeats idempotently on later ticks.
    tokio::time::advance(Duration::from_secs(2)).await;
    f.engine.handle(RuleInput::InactivityTick).await;
    assert_eq!(f.dispatcher.count(&f.lamp.id, "turnOff"), 1);
    assert_eq!(f.dispatcher.count(&f.thermostat.id, "setMode"), 1);

    f.engine.handle(RuleInput::InactivityTick).await;
    assert_eq!(f.dispatcher.count(&f.lamp.id, "turnOff"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_inactivity_tick_respects_manual_cooldown() {
    let mut f = setup();

    f.engine
        .handle(change(&f.lamp, "on", PropertyValue::Bool(true)))
        .await;
    f.engine
        .handle(change(&f.motion, "motion", PropertyValue::Bool(true)))
        .await;
    tokio::time::advance(Duration::from_secs(301)).await;

    f.engine
        .handle(change(&f.thermostat, "mode", PropertyValue::from("manual")))
        .await;
    f.engine.handle(RuleInput::InactivityTick).await;
    assert_eq!(f.dispatcher.total(), 0);

    tokio::time::advance(Duration::from_secs(31)).await;
    f.engine.handle(RuleInput::InactivityTick).await;
    assert_eq!(f.dispatcher.count(&f.lamp.id, "turnOff"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_inactivity_tick_backstops_cold_plus_presence() {
    let mut f = setup();

    f.engine
        .handle(change(&f.lamp, "on", PropertyValue::Bool(true)))
        .await;
    f.engine
        .handle(change(&f.thermostat, "mode", PropertyValue::from("eco")))
        .await;
    // Cold reading arrives while nobody is present: the reactive rule
    // correctly stays quiet.
    f.engine
        .handle(change(&f.thermostat, "currentTemperature", PropertyValue::Number(17.0)))
        .await;
    f.engine
        .handle(change(&f.motion, "motion", PropertyValue::Bool(true)))
        .await;
    assert_eq!(f.dispatcher.count(&f.thermostat.id, "setMode"), 0);

    // The periodic re-check catches the missed combination.
    f.engine.handle(RuleInput::InactivityTick).await;
    assert_eq!(f.dispatcher.count(&f.thermostat.id, "setMode"), 1);
    let (_, request) = f.dispatcher.last().unwrap();
    assert_eq!(request.params, json!({ "mode": "comfort" }));
}

#[tokio::test(start_paused = true)]
async fn test_unmapped_changes_are_ignored() {
    let mut f = setup();

    f.engine
        .handle(change(&f.lamp, "brightness", PropertyValue::Number(40.0)))
        .await;
    f.engine
        .handle(change(&f.lamp, "color", PropertyValue::from("red")))
        .await;

    assert_eq!(f.dispatcher.total(), 0);
    assert!(!f.engine.state().lamp_on);
}
