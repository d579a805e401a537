//! Infrastructure layer - I/O adapters around the domain
//!
//! HTTP clients for both directions of the peer/gateway conversation,
//! configuration loading and the `.env` token bootstrap.

pub mod config;
pub mod http;
pub mod token;

pub use config::{GatewayConfig, PeerConfig};
pub use http::gateway_client::{GatewayClient, RegistrationReply};
pub use http::peer_client::{HttpDispatcher, PeerClient};
