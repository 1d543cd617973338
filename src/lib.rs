//! # MathAgent
//!
//! Named math agents behind an HTTP and WebSocket gateway.
//!
//! ## Features
//!
//! - **Operation Table:** arithmetic, roots, trigonometry and logarithms with
//!   typed failures (`DivisionByZero`, `DomainError`, ...)
//! - **Agent Sessions:** each agent owns its open legs and dispatches requests
//!   from HTTP and WebSocket alike
//! - **Pluggable Storage:** agent records in memory or on disk, rehydrated after
//!   idle eviction
//! - **Client Library:** `GatewayClient` over HTTP, `LegClient` over WebSocket

pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod operations;
pub mod session;
pub mod store;

pub use config::Config;
pub use error::{Error, ErrorKind, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const NAME: &str = env!("CARGO_PKG_NAME");
