//! Domain layer - Pure business logic with no external dependencies
//!
//! This crate contains:
//! - Entities (Thing, PropertySet)
//! - Value Objects (ThingKind, PropertyValue, ThermostatMode)
//! - Domain Events (ChangeEvent, GatewayEvent)
//! - The command dispatch interface (trait)
//!
//! Principles:
//! - No dependencies on infrastructure
//! - Business rules enforced at domain level
//! - Testable in isolation

pub mod dispatch;
pub mod error;
pub mod event;
pub mod rules;
pub mod thing;

// Re-export commonly used types
pub use dispatch::{ActionRequest, CommandDispatcher};
pub use error::{DomainError, Result};
pub use event::{ChangeEvent, GatewayEvent};
pub use rules::{RuleSettings, ThermostatMode};
pub use thing::{Action, PropertySet, PropertyValue, ThingDescriptor, ThingId, ThingKind};
