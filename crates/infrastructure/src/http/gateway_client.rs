use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use domain::{DomainError, PropertyValue, Result, ThingId, ThingKind};

use crate::token;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Gateway's answer to a registration request.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationReply {
    pub id: ThingId,
    #[serde(default, rename = "deviceToken")]
    pub device_token: Option<String>,
}

/// Peer-side client for the gateway's HTTP surface.
#[derive(Clone)]
pub struct GatewayClient {
    base_url: String,
    env_file: PathBuf,
    client: reqwest::Client,
}

impl GatewayClient {
    pub fn new(base_url: impl Into<String>, env_file: impl Into<PathBuf>) -> Self {
        Self {
            base_url: base_url.into(),
            env_file: env_file.into(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Current system token, re-read from the env file on every call so a
    /// peer that started before the gateway picks the token up once it
    /// appears.
    pub fn system_token(&self) -> Option<String> {
        token::load_system_token(&self.env_file)
    }

    /// Registers the peer with a bounded retry loop. An attempt without a
    /// system token is skipped but still counts against the budget; on
    /// exhaustion the peer cannot function and gets `RegistrationExhausted`.
    pub async fn register(
        &self,
        name: &str,
        kind: ThingKind,
        endpoint: &str,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Result<RegistrationReply> {
        for attempt in 1..=max_retries {
            let Some(system_token) = self.system_token() else {
                warn!(attempt, max_retries, "SYSTEM_TOKEN not available yet, retrying");
                tokio::time::sleep(retry_delay).await;
                continue;
            };

            let body = serde_json::json!({ "name": name, "kind": kind, "endpoint": endpoint });
            match self
                .client
                .post(self.url("/things"))
                .timeout(REQUEST_TIMEOUT)
                .bearer_auth(&system_token)
                .json(&body)
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => match resp.json::<RegistrationReply>().await {
                    Ok(reply) => {
                        info!(thing_id = %reply.id, "Registered with gateway");
                        return Ok(reply);
                    }
                    Err(e) => warn!(attempt, error = %e, "Malformed registration reply, retrying"),
                },
                Ok(resp) => {
                    warn!(attempt, status = %resp.status(), "Registration rejected, retrying")
                }
                Err(e) => warn!(attempt, error = %e, "Gateway unreachable, retrying"),
            }

            tokio::time::sleep(retry_delay).await;
        }

        Err(DomainError::RegistrationExhausted {
            attempts: max_retries,
        })
    }

    /// Property-change notification. Callers treat failure as best-effort:
    /// the local mutation stays authoritative either way.
    pub async fn notify_updated(
        &self,
        id: &ThingId,
        kind: ThingKind,
        changes: &[(String, PropertyValue)],
    ) -> Result<()> {
        let mut properties = serde_json::Map::new();
        for (key, value) in changes {
            properties.insert(key.clone(), value.to_json());
        }
        let body = serde_json::json!({ "thingId": id, "kind": kind, "properties": properties });

        let resp = self
            .client
            .post(self.url(&format!("/things/{id}/updated")))
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| DomainError::Unreachable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(DomainError::InvalidPayload(format!(
                "notification rejected with status {}",
                resp.status()
            )));
        }
        Ok(())
    }

    /// Appends an audit event to the gateway's event sink. Best-effort: a
    /// missing token or an unreachable gateway only logs.
    pub async fn post_event(
        &self,
        id: &ThingId,
        kind: ThingKind,
        event_type: &str,
        data: serde_json::Value,
    ) {
        let Some(system_token) = self.system_token() else {
            debug!(event_type, "No system token, audit event skipped");
            return;
        };

        let body = serde_json::json!({
            "thingId": id,
            "thingType": kind,
            "type": event_type,
            "data": data,
        });

        let result = self
            .client
            .post(self.url("/event"))
            .timeout(REQUEST_TIMEOUT)
            .bearer_auth(&system_token)
            .json(&body)
            .send()
            .await;
        if let Err(e) = result {
            debug!(event_type, error = %e, "Audit event not delivered");
        }
    }
}
