use serde::{Deserialize, Serialize};
use std::fmt;

use super::ThingKind;

/// Registry-assigned thing identity, formatted `{kind}-{unix-millis}`.
///
/// The millisecond component is advanced monotonically by the registry, so
/// ids stay unique even when two registrations land in the same millisecond.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThingId(String);

impl ThingId {
    pub fn assign(kind: ThingKind, unix_millis: i64) -> Self {
        Self(format!("{}-{}", kind.as_str(), unix_millis))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ThingId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for ThingId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl fmt::Display for ThingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
