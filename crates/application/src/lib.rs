//! Application layer - Use cases and business workflows

pub mod propagator;
pub mod registry;
pub mod rules;

pub use propagator::ChangePropagator;
pub use registry::ThingRegistry;
pub use rules::LoggingDispatcher;
pub use rules::engine::{
    CondensedAutomationState, RuleEngine, RuleInput, SimulatedUpdate, start_ticks,
};
