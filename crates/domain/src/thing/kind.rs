use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;

/// The closed set of device kinds the gateway knows how to automate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThingKind {
    #[serde(rename = "lamp")]
    Lamp,
    #[serde(rename = "motion")]
    MotionSensor,
    #[serde(rename = "thermostat")]
    Thermostat,
}

impl ThingKind {
    /// Wire name, also used as the prefix of assigned thing ids.
    pub fn as_str(&self) -> &'static str {
        match self {
            ThingKind::Lamp => "lamp",
            ThingKind::MotionSensor => "motion",
            ThingKind::Thermostat => "thermostat",
        }
    }
}

impl fmt::Display for ThingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThingKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lamp" => Ok(ThingKind::Lamp),
            "motion" => Ok(ThingKind::MotionSensor),
            "thermostat" => Ok(ThingKind::Thermostat),
            other => Err(DomainError::InvalidPayload(format!(
                "unknown thing kind: {other}"
            ))),
        }
    }
}
