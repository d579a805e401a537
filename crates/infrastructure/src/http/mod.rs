pub mod gateway_client;
pub mod peer_client;
