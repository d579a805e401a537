use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use domain::RuleSettings;

/// Gateway process configuration. Every field has a default so the gateway
/// can start with no config file at all; CLI flags override on top.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GatewayConfig {
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// Shared credential for registration and audit endpoints. Generated at
    /// startup when unset.
    #[serde(default)]
    pub system_token: Option<String>,
    /// `.env` file through which the token reaches the peers.
    #[serde(default = "default_env_file")]
    pub env_file: String,
    #[serde(default)]
    pub rules: RuleSettings,
}

fn default_api_port() -> u16 {
    3000
}

fn default_env_file() -> String {
    ".env".to_string()
}

impl GatewayConfig {
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(&format!("{config_dir}/gateway")).required(false))
            // Environment variables, e.g. HEARTH__API_PORT=8080,
            // HEARTH__RULES__COLD_THRESHOLD_C=17.5
            .add_source(Environment::with_prefix("HEARTH").separator("__"))
            .build()?
            .try_deserialize()
    }
}

/// Peer process configuration. The kind has no sensible default and must
/// come from the file or the CLI.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PeerConfig {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,
    #[serde(default = "default_env_file")]
    pub env_file: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Motion peers only: fire `simulateMotion` on this interval.
    #[serde(default)]
    pub simulate_motion_secs: Option<u64>,
}

fn default_gateway_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_max_retries() -> u32 {
    20
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

impl PeerConfig {
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(&format!("{config_dir}/peer")).required(false))
            .add_source(Environment::with_prefix("HEARTH").separator("__"))
            .build()?
            .try_deserialize()
    }
}
