use chrono::Utc;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use domain::thing::MotionAction;
use domain::{Action, PropertySet, PropertyValue, Result, ThingId, ThingKind};
use infrastructure::GatewayClient;

/// A simulated motion detection clears itself after this long, so the
/// sensor can fire again and the gateway sees the falling edge too.
const MOTION_RESET: Duration = Duration::from_secs(2);

/// Local observer of property changes, invoked synchronously per changed
/// key after the value is stored.
pub type PropertyListener = Box<dyn Fn(&str, &PropertyValue) + Send + Sync>;

/// Device runtime: the authoritative property set of one peer process.
///
/// Every mutation, whether commanded by the gateway or produced locally,
/// goes through [`Thing::set_properties`], so the gateway notification path
/// is uniform. Notifications are fire-and-forget; the local state stays
/// authoritative when the gateway is unreachable.
pub struct Thing {
    kind: ThingKind,
    name: String,
    endpoint: String,
    id: RwLock<Option<ThingId>>,
    properties: RwLock<PropertySet>,
    gateway: GatewayClient,
    /// Pending motion reset. A new detection replaces it instead of
    /// stacking a second timer.
    motion_reset: Mutex<Option<JoinHandle<()>>>,
    listeners: RwLock<Vec<PropertyListener>>,
}

impl Thing {
    pub fn new(kind: ThingKind, name: String, endpoint: String, gateway: GatewayClient) -> Self {
        Self {
            kind,
            name,
            endpoint,
            id: RwLock::new(None),
            properties: RwLock::new(PropertySet::for_kind(kind)),
            gateway,
            motion_reset: Mutex::new(None),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Registers a local observer. Listeners run synchronously on the
    /// mutating path, so they should be cheap.
    pub fn on_property_change<F>(&self, listener: F)
    where
        F: Fn(&str, &PropertyValue) + Send + Sync + 'static,
    {
        self.listeners.write().unwrap().push(Box::new(listener));
    }

    pub fn kind(&self) -> ThingKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn id(&self) -> Option<ThingId> {
        self.id.read().unwrap().clone()
    }

    pub fn set_id(&self, id: ThingId) {
        *self.id.write().unwrap() = Some(id);
    }

    pub fn properties_json(&self) -> serde_json::Value {
        self.properties.read().unwrap().to_json()
    }

    /// Registers with the gateway, blocking until it succeeds or the retry
    /// budget runs out. Without an id the peer cannot notify and is useless.
    pub async fn register(&self, max_retries: u32, retry_delay: Duration) -> Result<()> {
        let reply = self
            .gateway
            .register(&self.name, self.kind, &self.endpoint, max_retries, retry_delay)
            .await?;
        self.set_id(reply.id);
        Ok(())
    }

    /// Applies property changes and notifies the gateway about the ones that
    /// actually changed a value. Unknown keys fail before anything is
    /// written.
    pub fn set_properties(&self, changes: &[(String, PropertyValue)]) -> Result<()> {
        let mut changed = Vec::new();
        {
            let mut properties = self.properties.write().unwrap();
            for (key, value) in changes {
                if properties.get(key) == Some(value) {
                    continue;
                }
                properties.set(key, value.clone())?;
                changed.push((key.clone(), value.clone()));
            }
        }

        if changed.is_empty() {
            return Ok(());
        }

        {
            let listeners = self.listeners.read().unwrap();
            for (key, value) in &changed {
                for listener in listeners.iter() {
                    listener(key, value);
                }
            }
        }

        self.notify(changed);
        Ok(())
    }

    pub fn set_property(&self, key: &str, value: PropertyValue) -> Result<()> {
        self.set_properties(&[(key.to_string(), value)])
    }

    /// Validates and executes one action invocation. The property deltas go
    /// through the same store and notification path as any other mutation.
    pub async fn execute_action(
        self: Arc<Self>,
        name: &str,
        params: &serde_json::Value,
    ) -> Result<()> {
        let action = Action::parse(self.kind, name, params)?;
        info!(action = %name, "Executing action");

        self.set_properties(&action.apply(Utc::now()))?;

        if matches!(action, Action::Motion(MotionAction::SimulateMotion)) {
            self.clone().schedule_motion_reset();
        }

        self.post_action_event(name, params.clone());
        Ok(())
    }

    /// Motion clears itself after [`MOTION_RESET`]; a fresh detection while
    /// a reset is pending pushes the falling edge out.
    fn schedule_motion_reset(self: Arc<Self>) {
        let mut pending = self.motion_reset.lock().unwrap();
        if let Some(handle) = pending.take() {
            handle.abort();
        }

        let thing = self.clone();
        // Capture the deadline now, not when the task is first polled, so
        // the reset is measured from the detection itself.
        let sleep = tokio::time::sleep(MOTION_RESET);
        *pending = Some(tokio::spawn(async move {
            sleep.await;
            debug!("Motion reset elapsed");
            if let Err(e) = thing.set_property("motion", PropertyValue::Bool(false)) {
                warn!(error = %e, "Motion reset not applied");
            }
        }));
    }

    /// Fire-and-forget property-change notification. Requires an assigned
    /// id; before registration completes, changes stay local.
    fn notify(&self, changes: Vec<(String, PropertyValue)>) {
        let Some(id) = self.id() else {
            debug!("Not registered yet, change not propagated");
            return;
        };

        let gateway = self.gateway.clone();
        let kind = self.kind;
        tokio::spawn(async move {
            if let Err(e) = gateway.notify_updated(&id, kind, &changes).await {
                warn!(thing_id = %id, error = %e, "Gateway notification failed");
            }
        });
    }

    /// Best-effort audit trail entry for an executed action.
    fn post_action_event(&self, action: &str, params: serde_json::Value) {
        let Some(id) = self.id() else {
            return;
        };

        let gateway = self.gateway.clone();
        let kind = self.kind;
        let data = serde_json::json!({ "action": action, "params": params });
        tokio::spawn(async move {
            gateway.post_event(&id, kind, "actionExecuted", data).await;
        });
    }
}
