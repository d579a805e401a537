use serde::{Deserialize, Serialize};

use super::{ThingId, ThingKind};

/// Registry entry for a connected peer. Created on successful registration
/// and never mutated afterwards; absence of the peer is only detected lazily
/// when a dispatch to `endpoint` fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThingDescriptor {
    pub id: ThingId,
    pub name: String,
    pub kind: ThingKind,
    /// Base URL of the peer's own HTTP surface, e.g. `http://localhost:3001`.
    pub endpoint: String,
}

impl ThingDescriptor {
    pub fn new(id: ThingId, name: String, kind: ThingKind, endpoint: String) -> Self {
        Self {
            id,
            name,
            kind,
            endpoint,
        }
    }

    /// URL of a named action on the peer.
    pub fn action_url(&self, action: &str) -> String {
        format!("{}/actions/{}", self.endpoint.trim_end_matches('/'), action)
    }

    /// URL of the peer's property snapshot.
    pub fn properties_url(&self) -> String {
        format!("{}/properties", self.endpoint.trim_end_matches('/'))
    }
}
