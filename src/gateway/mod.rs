//! Gateway module - HTTP and WebSocket front door
//!
//! The gateway validates request shape, resolves agent ids to live sessions
//! and hands the rest to the session. It holds no state of its own beyond the
//! shared `SessionRegistry`.
//!
//! ## Routes
//!
//! ```text
//! POST /agent                      create an agent
//! GET  /agent/{id}                 agent info
//! POST /agent/{id}/mcp             dispatch an operation
//! POST /agent/{id}/broadcast       push a message to every open leg
//! GET  /agent/{id}/websocket       open a leg (WebSocket upgrade)
//! POST /mcp                        dispatch an operation, agent id in the body
//! GET  /status                     liveness probe
//! ```

mod cors;
pub mod protocol;
mod routes;
mod websocket;

use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::config::{GatewayConfig, SessionConfig};
use crate::error::{Error, Result};
use crate::session::SessionRegistry;

pub use cors::CORS_HEADERS;
pub use protocol::{
    ClientFrame, ErrorBody, OperationRequest, ServerFrame, KEEPALIVE_INTERVAL_SECS,
    PROTOCOL_VERSION,
};

/// Shared handler state
#[derive(Clone)]
pub(crate) struct AppState {
    pub registry: SessionRegistry,
    pub report_live_count: bool,
    pub leg_idle_timeout: Option<Duration>,
}

/// The HTTP gateway
pub struct GatewayServer {
    registry: SessionRegistry,
    report_live_count: bool,
    leg_idle_timeout: Option<Duration>,
}

impl GatewayServer {
    pub fn new(registry: SessionRegistry) -> Self {
        Self {
            registry,
            report_live_count: false,
            leg_idle_timeout: None,
        }
    }

    /// Build a server with the gateway and session settings applied
    pub fn from_config(
        registry: SessionRegistry,
        gateway: &GatewayConfig,
        session: &SessionConfig,
    ) -> Self {
        Self::new(registry)
            .with_live_count(gateway.report_live_agent_count)
            .with_leg_idle_timeout(session.leg_idle_timeout)
    }

    /// Report the live agent count on `/status` instead of 0
    pub fn with_live_count(mut self, enabled: bool) -> Self {
        self.report_live_count = enabled;
        self
    }

    /// Close legs that stay silent for longer than `timeout`
    pub fn with_leg_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.leg_idle_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn router(&self) -> Router {
        let state = AppState {
            registry: self.registry.clone(),
            report_live_count: self.report_live_count,
            leg_idle_timeout: self.leg_idle_timeout,
        };

        Router::new()
            .route("/agent", post(routes::create_agent))
            .route("/agent/{agent_id}", get(routes::agent_info))
            .route("/agent/{agent_id}/mcp", post(routes::agent_mcp))
            .route("/agent/{agent_id}/broadcast", post(routes::broadcast))
            .route("/agent/{agent_id}/websocket", get(websocket::ws_handler))
            .route("/mcp", post(routes::mcp))
            .route("/status", get(routes::status))
            .fallback(routes::not_found)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(axum::middleware::from_fn(cors::cors))
                    .layer(TraceLayer::new_for_http())
                    .layer(CatchPanicLayer::custom(routes::handle_panic)),
            )
    }

    /// Bind and serve until `shutdown` resolves
    pub async fn start<F>(&self, host: &str, port: u16, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        let addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Transport(format!("Cannot bind {}: {}", addr, e)))?;

        let local = listener.local_addr()?;
        tracing::info!("Gateway listening on http://{}", local);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}
