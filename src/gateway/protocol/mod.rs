//! Gateway Protocol - HTTP bodies and leg frames
//!
//! ## Leg Frames
//!
//! JSON text frames over a persistent WebSocket leg, tagged by `type`:
//!
//! - `connected` (server): sent once when the leg is accepted
//! - `mcp_request` (client) / `mcp_response` (server): operation dispatch
//! - `ping` (client) / `pong` (server): keep-alive
//! - `error` (server): any failure; the leg stays open

pub mod schema;
pub mod types;

pub use schema::{
    timestamp, ClientFrame, OperationRequest, ServerFrame, KEEPALIVE_INTERVAL_SECS,
    PROTOCOL_VERSION, SERVER_FRAME_TYPES,
};
pub use types::*;
