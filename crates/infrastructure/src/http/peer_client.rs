use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use domain::{ActionRequest, CommandDispatcher, DomainError, Result, ThingDescriptor};

/// Bounded timeout so a hung peer can never stall the gateway's reactive
/// loop; a timed-out call is treated like any other failed one.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Gateway-side read access to peer endpoints.
#[derive(Clone)]
pub struct PeerClient {
    client: reqwest::Client,
}

impl PeerClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Proxies `GET {endpoint}/properties`.
    pub async fn fetch_properties(&self, thing: &ThingDescriptor) -> Result<serde_json::Value> {
        let resp = self
            .client
            .get(thing.properties_url())
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| DomainError::Unreachable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(DomainError::Unreachable(format!(
                "{} answered {}",
                thing.id,
                resp.status()
            )));
        }

        resp.json()
            .await
            .map_err(|e| DomainError::InvalidPayload(e.to_string()))
    }
}

impl Default for PeerClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Fire-and-forget command delivery to a peer's action endpoint. The call
/// returns as soon as the request is spawned; success is observed only via
/// the peer's own subsequent property-change notification, failure only via
/// logs. No retry - a missed command self-heals through the periodic ticks.
pub struct HttpDispatcher {
    client: reqwest::Client,
    system_token: String,
}

impl HttpDispatcher {
    pub fn new(system_token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            system_token,
        }
    }
}

#[async_trait]
impl CommandDispatcher for HttpDispatcher {
    async fn dispatch(&self, target: &ThingDescriptor, request: &ActionRequest) {
        let client = self.client.clone();
        let token = self.system_token.clone();
        let url = target.action_url(&request.name);
        let thing_id = target.id.clone();
        let action = request.name.clone();
        let params = request.params.clone();

        tokio::spawn(async move {
            let result = client
                .post(&url)
                .timeout(REQUEST_TIMEOUT)
                .bearer_auth(&token)
                .json(&params)
                .send()
                .await;

            // Always non-fatal: the failure is named and logged, never
            // propagated back into the engine.
            let outcome = match result {
                Ok(resp) if resp.status().is_success() => {
                    debug!(thing_id = %thing_id, action = %action, "Dispatch delivered");
                    return;
                }
                Ok(resp) => DomainError::DispatchFailed {
                    thing_id: thing_id.to_string(),
                    action: action.clone(),
                    reason: format!("peer answered {}", resp.status()),
                },
                Err(e) if e.is_timeout() || e.is_connect() => {
                    DomainError::Unreachable(e.to_string())
                }
                Err(e) => DomainError::DispatchFailed {
                    thing_id: thing_id.to_string(),
                    action: action.clone(),
                    reason: e.to_string(),
                },
            };
            warn!(thing_id = %thing_id, action = %action, error = %outcome, "Dispatch failed");
        });
    }
}
