use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use domain::{ChangeEvent, GatewayEvent, PropertyValue, Result, ThingId};

use crate::registry::ThingRegistry;
use crate::rules::engine::RuleInput;

/// Fans a peer's property-change notification out to the registry cache,
/// the dashboard broadcast and the rule engine.
///
/// The two downstream sinks are independent: a lagging dashboard or a closed
/// engine channel is contained per sink and never fails the caller or the
/// other sink. Only validation errors (unknown peer, non-scalar values)
/// surface as rejections.
#[derive(Clone)]
pub struct ChangePropagator {
    registry: Arc<ThingRegistry>,
    engine_tx: mpsc::Sender<RuleInput>,
}

impl ChangePropagator {
    pub fn new(registry: Arc<ThingRegistry>, engine_tx: mpsc::Sender<RuleInput>) -> Self {
        Self {
            registry,
            engine_tx,
        }
    }

    /// Processes one notification. Keys are handled in the order the peer
    /// supplied them; an empty map is a valid no-op.
    pub async fn on_thing_update(
        &self,
        thing_id: &ThingId,
        properties: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        let descriptor = self.registry.lookup(thing_id)?;

        if properties.is_empty() {
            debug!(thing_id = %thing_id, "Empty update, nothing to propagate");
            return Ok(());
        }

        let changes: Vec<(String, PropertyValue)> = properties
            .iter()
            .map(|(key, value)| PropertyValue::from_json(value).map(|v| (key.clone(), v)))
            .collect::<Result<_>>()?;

        self.registry.apply_update(thing_id, &changes)?;

        self.registry.broadcast(GatewayEvent::ThingUpdated {
            thing_id: thing_id.clone(),
            kind: descriptor.kind,
            properties: properties.clone(),
        });

        for (key, value) in changes {
            let event = ChangeEvent::new(thing_id.clone(), descriptor.kind, key, value);
            if let Err(e) = self.engine_tx.send(RuleInput::Change(event)).await {
                warn!(thing_id = %thing_id, error = %e, "Rule engine channel closed, change dropped");
            }
        }

        Ok(())
    }
}
