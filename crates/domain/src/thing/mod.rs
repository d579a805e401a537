mod action;
mod descriptor;
mod id;
mod kind;
mod property;

pub use action::{Action, LampAction, MotionAction, ThermostatAction};
pub use descriptor::ThingDescriptor;
pub use id::ThingId;
pub use kind::ThingKind;
pub use property::{PropertySet, PropertyValue};
