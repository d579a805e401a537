use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Operating mode of the thermostat. `manual` marks a user override and
/// starts the automation cooldown; `off` means no heating at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThermostatMode {
    Manual,
    Eco,
    Comfort,
    Off,
}

impl ThermostatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThermostatMode::Manual => "manual",
            ThermostatMode::Eco => "eco",
            ThermostatMode::Comfort => "comfort",
            ThermostatMode::Off => "off",
        }
    }
}

impl fmt::Display for ThermostatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThermostatMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(ThermostatMode::Manual),
            "eco" => Ok(ThermostatMode::Eco),
            "comfort" => Ok(ThermostatMode::Comfort),
            "off" => Ok(ThermostatMode::Off),
            _ => Err(()),
        }
    }
}

/// Tunable constants of the rule engine. The values are deliberate
/// debounce/threshold choices, not correctness requirements, so they are
/// exposed as named options rather than hard-coded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSettings {
    /// Temperature below which the cold+presence rule applies.
    #[serde(default = "default_cold_threshold_c")]
    pub cold_threshold_c: f64,
    /// Window after a manual override during which automation is suppressed.
    #[serde(default = "default_manual_cooldown_ms")]
    pub manual_cooldown_ms: u64,
    /// Delay before the lamp is automatically turned off after motion.
    /// Canonical profile: 2000 ms. A 60000 ms profile exists for deployments
    /// that prefer slow auto-off; pick one per deployment, never both.
    #[serde(default = "default_motion_auto_off_ms")]
    pub motion_auto_off_ms: u64,
    /// Motionless period after which the inactivity rule fires.
    #[serde(default = "default_inactivity_threshold_ms")]
    pub inactivity_threshold_ms: u64,
    /// Interval of the environmental simulation tick.
    #[serde(default = "default_env_tick_ms")]
    pub env_tick_ms: u64,
    /// Interval of the inactivity-check tick.
    #[serde(default = "default_inactivity_tick_ms")]
    pub inactivity_tick_ms: u64,
}

fn default_cold_threshold_c() -> f64 {
    18.0
}
fn default_manual_cooldown_ms() -> u64 {
    30_000
}
fn default_motion_auto_off_ms() -> u64 {
    2_000
}
fn default_inactivity_threshold_ms() -> u64 {
    300_000
}
fn default_env_tick_ms() -> u64 {
    3_000
}
fn default_inactivity_tick_ms() -> u64 {
    30_000
}

impl Default for RuleSettings {
    fn default() -> Self {
        Self {
            cold_threshold_c: default_cold_threshold_c(),
            manual_cooldown_ms: default_manual_cooldown_ms(),
            motion_auto_off_ms: default_motion_auto_off_ms(),
            inactivity_threshold_ms: default_inactivity_threshold_ms(),
            env_tick_ms: default_env_tick_ms(),
            inactivity_tick_ms: default_inactivity_tick_ms(),
        }
    }
}

impl RuleSettings {
    pub fn manual_cooldown(&self) -> Duration {
        Duration::from_millis(self.manual_cooldown_ms)
    }

    pub fn motion_auto_off(&self) -> Duration {
        Duration::from_millis(self.motion_auto_off_ms)
    }

    pub fn inactivity_threshold(&self) -> Duration {
        Duration::from_millis(self.inactivity_threshold_ms)
    }

    pub fn env_tick(&self) -> Duration {
        Duration::from_millis(self.env_tick_ms)
    }

    pub fn inactivity_tick(&self) -> Duration {
        Duration::from_millis(self.inactivity_tick_ms)
    }
}
