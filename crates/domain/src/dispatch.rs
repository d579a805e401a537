use async_trait::async_trait;
use serde_json::json;

use crate::rules::ThermostatMode;
use crate::thing::ThingDescriptor;

/// A named action invocation bound for a peer's action endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub name: String,
    pub params: serde_json::Value,
}

impl ActionRequest {
    pub fn new(name: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// Parameterless action, e.g. `turnOn`.
    pub fn plain(name: impl Into<String>) -> Self {
        Self::new(name, json!({}))
    }

    pub fn set_mode(mode: ThermostatMode) -> Self {
        Self::new("setMode", json!({ "mode": mode.as_str() }))
    }
}

/// Outbound command seam between the rule engine and the network.
///
/// Implementations must return promptly: delivery is fire-and-forget, success
/// or failure is observed only via logging and the peer's own subsequent
/// property-change notification.
#[async_trait]
pub trait CommandDispatcher: Send + Sync {
    async fn dispatch(&self, target: &ThingDescriptor, request: &ActionRequest);
}
