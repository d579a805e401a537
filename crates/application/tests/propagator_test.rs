use application::propagator::ChangePropagator;
use application::registry::ThingRegistry;
use application::rules::engine::RuleInput;
use domain::{DomainError, GatewayEvent, PropertyValue, ThingId, ThingKind};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;

fn setup() -> (Arc<ThingRegistry>, ChangePropagator, mpsc::Receiver<RuleInput>) {
    let registry = Arc::new(ThingRegistry::new());
    let (tx, rx) = mpsc::channel(16);
    let propagator = ChangePropagator::new(registry.clone(), tx);
    (registry, propagator, rx)
}

fn props(pairs: &[(&str, serde_json::Value)]) -> serde_json::Map<String, serde_json::Value> {
    let mut map = serde_json::Map::new();
    for (key, value) in pairs {
        map.insert(key.to_string(), value.clone());
    }
    map
}

#[tokio::test]
async fn test_unknown_thing_is_rejected() {
    let (_registry, propagator, _rx) = setup();

    let err = propagator
        .on_thing_update(&ThingId::from("lamp-404"), &props(&[("on", json!(true))]))
        .await
        .unwrap_err();

    assert_eq!(err, DomainError::UnknownThing("lamp-404".into()));
}

#[tokio::test]
async fn test_empty_update_is_a_noop() {
    let (registry, propagator, mut rx) = setup();
    let lamp = registry.register("Lamp".into(), ThingKind::Lamp, "http://localhost:3001".into());

    propagator
        .on_thing_update(&lamp.id, &serde_json::Map::new())
        .await
        .unwrap();

    assert!(rx.try_recv().is_err(), "no change events for an empty map");
}

#[tokio::test]
async fn test_change_events_follow_supplied_key_order() {
    let (registry, propagator, mut rx) = setup();
    let thermostat = registry.register(
        "Thermostat".into(),
        ThingKind::Thermostat,
        "http://localhost:3002".into(),
    );

    propagator
        .on_thing_update(
            &thermostat.id,
            &props(&[
                ("currentTemperature", json!(18.5)),
                ("heating", json!(true)),
                ("mode", json!("comfort")),
            ]),
        )
        .await
        .unwrap();

    let mut keys = Vec::new();
    for _ in 0..3 {
        match rx.try_recv().unwrap() {
            RuleInput::Change(event) => {
                assert_eq!(event.thing_id, thermostat.id);
                assert_eq!(event.kind, ThingKind::Thermostat);
                keys.push(event.key);
            }
            other => panic!("unexpected input: {other:?}"),
        }
    }
    assert_eq!(keys, vec!["currentTemperature", "heating", "mode"]);

    // Registry cache observed the same values.
    let cached = registry.cached_properties(&thermostat.id).unwrap();
    assert_eq!(cached.get("currentTemperature"), Some(&PropertyValue::Number(18.5)));
    assert_eq!(cached.get("heating"), Some(&PropertyValue::Bool(true)));
}

#[tokio::test]
async fn test_broadcast_subscribers_see_thing_updated() {
    let (registry, propagator, _rx) = setup();
    let lamp = registry.register("Lamp".into(), ThingKind::Lamp, "http://localhost:3001".into());
    let mut events = registry.subscribe();

    propagator
        .on_thing_update(&lamp.id, &props(&[("on", json!(true))]))
        .await
        .unwrap();

    match events.recv().await.unwrap() {
        GatewayEvent::ThingUpdated {
            thing_id,
            kind,
            properties,
        } => {
            assert_eq!(thing_id, lamp.id);
            assert_eq!(kind, ThingKind::Lamp);
            assert_eq!(properties.get("on"), Some(&json!(true)));
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn test_closed_engine_channel_does_not_fail_the_caller() {
    let (registry, propagator, rx) = setup();
    let lamp = registry.register("Lamp".into(), ThingKind::Lamp, "http://localhost:3001".into());
    drop(rx);

    // The engine sink is gone; the update must still succeed and still
    // refresh the cache.
    propagator
        .on_thing_update(&lamp.id, &props(&[("on", json!(true))]))
        .await
        .unwrap();

    let cached = registry.cached_properties(&lamp.id).unwrap();
    assert_eq!(cached.get("on"), Some(&PropertyValue::Bool(true)));
}

#[tokio::test]
async fn test_non_scalar_values_are_rejected() {
    let (registry, propagator, mut rx) = setup();
    let lamp = registry.register("Lamp".into(), ThingKind::Lamp, "http://localhost:3001".into());

    let err = propagator
        .on_thing_update(&lamp.id, &props(&[("on", json!({"nested": true}))]))
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::InvalidPayload(_)));
    assert!(rx.try_recv().is_err(), "rejected updates feed no events");
}
