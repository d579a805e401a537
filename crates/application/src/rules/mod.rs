pub mod dispatcher;
pub mod engine;

pub use dispatcher::LoggingDispatcher;
pub use engine::{CondensedAutomationState, RuleEngine, RuleInput, SimulatedUpdate, start_ticks};
