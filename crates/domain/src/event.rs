use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::thing::{PropertyValue, ThingDescriptor, ThingId, ThingKind};

/// Unit of propagation between the change propagator and the rule engine:
/// one changed key of one peer, observed at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub thing_id: ThingId,
    pub kind: ThingKind,
    pub key: String,
    pub value: PropertyValue,
    pub observed_at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(thing_id: ThingId, kind: ThingKind, key: String, value: PropertyValue) -> Self {
        Self {
            thing_id,
            kind,
            key,
            value,
            observed_at: Utc::now(),
        }
    }
}

/// Messages published to dashboard subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum GatewayEvent {
    #[serde(rename = "things:list")]
    ThingsList(Vec<ThingDescriptor>),

    #[serde(rename = "thing:registered")]
    ThingRegistered(ThingDescriptor),

    #[serde(rename = "thing:updated")]
    ThingUpdated {
        #[serde(rename = "thingId")]
        thing_id: ThingId,
        kind: ThingKind,
        properties: serde_json::Map<String, serde_json::Value>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_event_wire_tags() {
        let descriptor = ThingDescriptor::new(
            ThingId::from("lamp-1"),
            "Lamp".to_string(),
            ThingKind::Lamp,
            "http://localhost:3001".to_string(),
        );

        let json = serde_json::to_value(GatewayEvent::ThingRegistered(descriptor)).unwrap();
        assert_eq!(json["type"], "thing:registered");
        assert_eq!(json["payload"]["id"], "lamp-1");
    }
}
