//! Client module - talking to a running gateway
//!
//! - `GatewayClient`: the HTTP routes (`reqwest`)
//! - `LegClient`: one persistent leg over WebSocket (`tokio-tungstenite`)

mod http;
mod leg;

pub use http::GatewayClient;
pub use leg::{leg_url, Incoming, LegClient};
