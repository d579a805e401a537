use chrono::{DateTime, Utc};

use super::{PropertyValue, ThingKind};
use crate::error::{DomainError, Result};
use crate::rules::ThermostatMode;

/// A validated action invocation, closed over the capability set of each
/// peer kind. An unsupported name fails at parse time, and every variant
/// applies exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Lamp(LampAction),
    Motion(MotionAction),
    Thermostat(ThermostatAction),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LampAction {
    TurnOn,
    TurnOff,
    /// Brightness is clamped to [0, 100] at parse time.
    SetBrightness { level: f64 },
    SetColor { color: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum MotionAction {
    SimulateMotion,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ThermostatAction {
    SetTarget { value: f64 },
    SetMode { mode: ThermostatMode },
    TurnOn,
    TurnOff,
}

impl Action {
    pub fn parse(kind: ThingKind, name: &str, params: &serde_json::Value) -> Result<Self> {
        let unsupported = || DomainError::UnsupportedAction {
            kind,
            name: name.to_string(),
        };

        match kind {
            ThingKind::Lamp => match name {
                "turnOn" => Ok(Action::Lamp(LampAction::TurnOn)),
                "turnOff" => Ok(Action::Lamp(LampAction::TurnOff)),
                "setBrightness" => {
                    let level = number_param(params, "value")?;
                    Ok(Action::Lamp(LampAction::SetBrightness {
                        level: level.clamp(0.0, 100.0),
                    }))
                }
                "setColor" => {
                    let color = string_param(params, "color")?;
                    Ok(Action::Lamp(LampAction::SetColor { color }))
                }
                _ => Err(unsupported()),
            },
            ThingKind::MotionSensor => match name {
                "simulateMotion" => Ok(Action::Motion(MotionAction::SimulateMotion)),
                _ => Err(unsupported()),
            },
            ThingKind::Thermostat => match name {
                "setTarget" => {
                    let value = number_param(params, "value")?;
                    Ok(Action::Thermostat(ThermostatAction::SetTarget { value }))
                }
                "setMode" => {
                    let raw = string_param(params, "mode")?;
                    let mode = raw.parse::<ThermostatMode>().map_err(|_| {
                        DomainError::InvalidPayload(format!("invalid thermostat mode: {raw}"))
                    })?;
                    Ok(Action::Thermostat(ThermostatAction::SetMode { mode }))
                }
                "turnOn" => Ok(Action::Thermostat(ThermostatAction::TurnOn)),
                "turnOff" => Ok(Action::Thermostat(ThermostatAction::TurnOff)),
                _ => Err(unsupported()),
            },
        }
    }

    /// Property deltas this action produces. Every delta is routed through
    /// the schema-validated property store, so the notification path stays
    /// uniform regardless of how the mutation originated.
    pub fn apply(&self, now: DateTime<Utc>) -> Vec<(String, PropertyValue)> {
        match self {
            Action::Lamp(LampAction::TurnOn) => {
                vec![("on".into(), PropertyValue::Bool(true))]
            }
            Action::Lamp(LampAction::TurnOff) => {
                vec![("on".into(), PropertyValue::Bool(false))]
            }
            Action::Lamp(LampAction::SetBrightness { level }) => {
                vec![("brightness".into(), PropertyValue::Number(*level))]
            }
            Action::Lamp(LampAction::SetColor { color }) => {
                vec![("color".into(), PropertyValue::Text(color.clone()))]
            }
            Action::Motion(MotionAction::SimulateMotion) => vec![
                ("motion".into(), PropertyValue::Bool(true)),
                ("lastDetected".into(), PropertyValue::Text(now.to_rfc3339())),
            ],
            Action::Thermostat(ThermostatAction::SetTarget { value }) => {
                vec![("targetTemperature".into(), PropertyValue::Number(*value))]
            }
            Action::Thermostat(ThermostatAction::SetMode { mode }) => {
                vec![("mode".into(), PropertyValue::Text(mode.as_str().to_string()))]
            }
            Action::Thermostat(ThermostatAction::TurnOn) => vec![(
                "mode".into(),
                PropertyValue::Text(ThermostatMode::Comfort.as_str().to_string()),
            )],
            Action::Thermostat(ThermostatAction::TurnOff) => vec![(
                "mode".into(),
                PropertyValue::Text(ThermostatMode::Off.as_str().to_string()),
            )],
        }
    }
}

fn number_param(params: &serde_json::Value, key: &str) -> Result<f64> {
    params
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| DomainError::InvalidPayload(format!("missing numeric param: {key}")))
}

fn string_param(params: &serde_json::Value, key: &str) -> Result<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| DomainError::InvalidPayload(format!("missing string param: {key}")))
}
