use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use application::{ChangePropagator, ThingRegistry};
use domain::CommandDispatcher;
use infrastructure::PeerClient;

const AUDIT_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    #[serde(rename = "thingId")]
    pub thing_id: String,
    #[serde(rename = "thingType", skip_serializing_if = "Option::is_none")]
    pub thing_type: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: serde_json::Value,
    pub at: DateTime<Utc>,
}

/// Append-only in-memory audit sink. Bounded: oldest entries fall off once
/// the capacity is reached (persistence is out of scope).
pub struct AuditLog {
    events: RwLock<VecDeque<AuditEvent>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            events: RwLock::new(VecDeque::new()),
        }
    }

    pub fn record(&self, event: AuditEvent) {
        let mut events = self.events.write().unwrap();
        if events.len() == AUDIT_CAPACITY {
            events.pop_front();
        }
        events.push_back(event);
    }

    pub fn snapshot(&self) -> Vec<AuditEvent> {
        self.events.read().unwrap().iter().cloned().collect()
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the HTTP surface needs, wired once at startup. No hidden
/// statics: the registry and the propagator are the only shared mutable
/// resources, and both are owned here.
pub struct AppState {
    pub registry: Arc<ThingRegistry>,
    pub propagator: ChangePropagator,
    pub dispatcher: Arc<dyn CommandDispatcher>,
    pub peers: PeerClient,
    pub system_token: String,
    pub audit: AuditLog,
}

impl AppState {
    pub fn new(
        registry: Arc<ThingRegistry>,
        propagator: ChangePropagator,
        dispatcher: Arc<dyn CommandDispatcher>,
        peers: PeerClient,
        system_token: String,
    ) -> Self {
        Self {
            registry,
            propagator,
            dispatcher,
            peers,
            system_token,
            audit: AuditLog::new(),
        }
    }
}
