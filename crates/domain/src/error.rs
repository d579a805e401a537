use thiserror::Error;

use crate::thing::ThingKind;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Unknown thing: {0}")]
    UnknownThing(String),

    #[error("Property {key} does not exist on {kind}")]
    UnknownProperty { kind: ThingKind, key: String },

    #[error("Action {name} not supported by {kind}")]
    UnsupportedAction { kind: ThingKind, name: String },

    #[error("Failed to register after {attempts} attempts")]
    RegistrationExhausted { attempts: u32 },

    #[error("Dispatch of {action} to {thing_id} failed: {reason}")]
    DispatchFailed {
        thing_id: String,
        action: String,
        reason: String,
    },

    #[error("Peer endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
