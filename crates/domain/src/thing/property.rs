use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::ThingKind;
use crate::error::{DomainError, Result};

/// Dynamically-typed scalar a property can hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl PropertyValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            PropertyValue::Null => serde_json::Value::Null,
            PropertyValue::Bool(b) => serde_json::Value::Bool(*b),
            PropertyValue::Number(n) => serde_json::json!(n),
            PropertyValue::Text(s) => serde_json::Value::String(s.clone()),
        }
    }

    /// Accepts only scalar JSON; arrays and objects are a payload error.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Null => Ok(PropertyValue::Null),
            serde_json::Value::Bool(b) => Ok(PropertyValue::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(PropertyValue::Number)
                .ok_or_else(|| DomainError::InvalidPayload(format!("non-finite number: {n}"))),
            serde_json::Value::String(s) => Ok(PropertyValue::Text(s.clone())),
            other => Err(DomainError::InvalidPayload(format!(
                "property values must be scalar, got: {other}"
            ))),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

impl From<f64> for PropertyValue {
    fn from(n: f64) -> Self {
        PropertyValue::Number(n)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Text(s.to_string())
    }
}

/// Schema-validated key/value store. The set of valid keys is fixed when the
/// set is built for a kind; writing an unknown key fails and leaves the
/// stored values untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertySet {
    #[serde(skip)]
    kind: ThingKind,
    #[serde(flatten)]
    values: HashMap<String, PropertyValue>,
}

impl PropertySet {
    /// Default property schema per kind, matching what each peer exposes.
    pub fn for_kind(kind: ThingKind) -> Self {
        let defaults: &[(&str, PropertyValue)] = match kind {
            ThingKind::Lamp => &[
                ("on", PropertyValue::Bool(false)),
                ("brightness", PropertyValue::Number(100.0)),
                ("color", PropertyValue::Text("white".to_string())),
            ],
            ThingKind::MotionSensor => &[
                ("motion", PropertyValue::Bool(false)),
                ("lastDetected", PropertyValue::Null),
            ],
            ThingKind::Thermostat => &[
                ("currentTemperature", PropertyValue::Number(20.0)),
                ("targetTemperature", PropertyValue::Number(19.0)),
                ("mode", PropertyValue::Text("comfort".to_string())),
                ("heating", PropertyValue::Bool(false)),
            ],
        };

        Self {
            kind,
            values: defaults
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    pub fn kind(&self) -> ThingKind {
        self.kind
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.values.get(key)
    }

    /// Overwrites an existing property. Unknown keys are a contract
    /// violation and are never silently created.
    pub fn set(&mut self, key: &str, value: PropertyValue) -> Result<()> {
        match self.values.get_mut(key) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(DomainError::UnknownProperty {
                kind: self.kind,
                key: key.to_string(),
            }),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertyValue)> {
        self.values.iter()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_get_returns_written_value() {
        let mut props = PropertySet::for_kind(ThingKind::Lamp);
        props.set("on", PropertyValue::Bool(true)).unwrap();
        assert_eq!(props.get("on"), Some(&PropertyValue::Bool(true)));
    }

    #[test]
    fn test_unknown_key_is_rejected_and_state_unchanged() {
        let mut props = PropertySet::for_kind(ThingKind::MotionSensor);
        let before = props.clone();

        let err = props.set("humidity", PropertyValue::Number(40.0)).unwrap_err();
        assert_eq!(
            err,
            DomainError::UnknownProperty {
                kind: ThingKind::MotionSensor,
                key: "humidity".to_string(),
            }
        );
        assert_eq!(props, before);
    }

    #[test]
    fn test_thermostat_defaults() {
        let props = PropertySet::for_kind(ThingKind::Thermostat);
        assert_eq!(props.get("currentTemperature"), Some(&PropertyValue::Number(20.0)));
        assert_eq!(props.get("targetTemperature"), Some(&PropertyValue::Number(19.0)));
        assert_eq!(props.get("mode").and_then(|v| v.as_str().map(String::from)), Some("comfort".into()));
        assert_eq!(props.get("heating"), Some(&PropertyValue::Bool(false)));
    }

    #[test]
    fn test_scalar_json_round_trip() {
        let v = PropertyValue::from_json(&serde_json::json!(21.5)).unwrap();
        assert_eq!(v, PropertyValue::Number(21.5));
        assert_eq!(v.to_json(), serde_json::json!(21.5));

        assert!(PropertyValue::from_json(&serde_json::json!([1, 2])).is_err());
        assert_eq!(
            PropertyValue::from_json(&serde_json::Value::Null).unwrap(),
            PropertyValue::Null
        );
    }
}
