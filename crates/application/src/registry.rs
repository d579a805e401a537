use std::sync::RwLock;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::broadcast;
use tracing::{info, warn};

use domain::{
    DomainError, GatewayEvent, PropertySet, PropertyValue, Result, ThingDescriptor, ThingId,
    ThingKind,
};

struct ThingRecord {
    descriptor: ThingDescriptor,
    /// Cached copy of the peer's property set, used for display and rule
    /// evaluation only. The peer process remains authoritative; this copy
    /// may be briefly stale between a peer-local mutation and the
    /// propagated notification.
    properties: PropertySet,
}

/// In-memory single source of truth for "who is connected".
///
/// Records are kept in registration order: `find_first_by_kind` resolves
/// ties by first-registered-wins, so later registrations of the same kind
/// stay addressable for display but never shadow the automation target.
pub struct ThingRegistry {
    things: RwLock<Vec<ThingRecord>>,
    /// Millisecond counter behind assigned ids, advanced monotonically so
    /// concurrent registrations within one millisecond still get distinct ids.
    last_id_ms: AtomicI64,
    tx: broadcast::Sender<GatewayEvent>,
}

impl ThingRegistry {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        Self {
            things: RwLock::new(Vec::new()),
            last_id_ms: AtomicI64::new(0),
            tx,
        }
    }

    /// Assigns an id, stores the descriptor with a default property cache
    /// and announces the registration to dashboard subscribers.
    pub fn register(&self, name: String, kind: ThingKind, endpoint: String) -> ThingDescriptor {
        let id = ThingId::assign(kind, self.next_id_millis());
        let descriptor = ThingDescriptor::new(id, name, kind, endpoint);

        {
            let mut things = self.things.write().unwrap();
            things.push(ThingRecord {
                descriptor: descriptor.clone(),
                properties: PropertySet::for_kind(kind),
            });
        }

        info!(thing_id = %descriptor.id, kind = %kind, endpoint = %descriptor.endpoint, "Thing registered");
        self.broadcast(GatewayEvent::ThingRegistered(descriptor.clone()));
        descriptor
    }

    /// Snapshot of all descriptors in registration order.
    pub fn list(&self) -> Vec<ThingDescriptor> {
        let things = self.things.read().unwrap();
        things.iter().map(|r| r.descriptor.clone()).collect()
    }

    pub fn lookup(&self, id: &ThingId) -> Result<ThingDescriptor> {
        let things = self.things.read().unwrap();
        things
            .iter()
            .find(|r| r.descriptor.id == *id)
            .map(|r| r.descriptor.clone())
            .ok_or_else(|| DomainError::UnknownThing(id.to_string()))
    }

    /// The effective automation peer for a kind: first registered wins.
    pub fn find_first_by_kind(&self, kind: ThingKind) -> Option<ThingDescriptor> {
        let things = self.things.read().unwrap();
        things
            .iter()
            .find(|r| r.descriptor.kind == kind)
            .map(|r| r.descriptor.clone())
    }

    pub fn cached_properties(&self, id: &ThingId) -> Result<PropertySet> {
        let things = self.things.read().unwrap();
        things
            .iter()
            .find(|r| r.descriptor.id == *id)
            .map(|r| r.properties.clone())
            .ok_or_else(|| DomainError::UnknownThing(id.to_string()))
    }

    /// Applies a propagated change to the cached property set. Keys outside
    /// the kind's schema are skipped with a warning: the cache exists for
    /// display and rule evaluation, and must not fail an otherwise valid
    /// notification.
    pub fn apply_update(&self, id: &ThingId, changes: &[(String, PropertyValue)]) -> Result<()> {
        let mut things = self.things.write().unwrap();
        let record = things
            .iter_mut()
            .find(|r| r.descriptor.id == *id)
            .ok_or_else(|| DomainError::UnknownThing(id.to_string()))?;

        for (key, value) in changes {
            if let Err(e) = record.properties.set(key, value.clone()) {
                warn!(thing_id = %id, key = %key, error = %e, "Skipping cache update for unknown key");
            }
        }
        Ok(())
    }

    /// Subscribe to dashboard-facing events.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.tx.subscribe()
    }

    /// Publish to dashboard subscribers. A send error only means there are
    /// currently no subscribers, which is not a failure.
    pub fn broadcast(&self, event: GatewayEvent) {
        let _ = self.tx.send(event);
    }

    fn next_id_millis(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        self.last_id_ms
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            // fetch_update only fails when the closure returns None
            .map(|last| now.max(last + 1))
            .unwrap_or(now)
    }
}

impl Default for ThingRegistry {
    fn default() -> Self {
        Self::new()
    }
}
