//! Peer process - one simulated device per process
//!
//! A peer owns its property set, executes the actions of its kind and
//! reports every property change back to the gateway.

pub mod runtime;
pub mod server;

pub use runtime::Thing;
