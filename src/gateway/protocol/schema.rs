//! Leg protocol schema
//!
//! Defines the wire format of the JSON text frames exchanged over a leg.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::operations::Params;

/// Protocol version
pub const PROTOCOL_VERSION: &str = "1.0.0";

/// Interval at which clients are expected to send `ping`
pub const KEEPALIVE_INTERVAL_SECS: u64 = 30;

/// `type` values of frames the gateway itself sends on a leg
pub const SERVER_FRAME_TYPES: [&str; 4] = ["connected", "mcp_response", "pong", "error"];

/// Current time as an ISO-8601 UTC string with millisecond precision
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// One operation invocation: `{method, params?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRequest {
    /// Operation name
    pub method: String,
    /// Named inputs; absent and `null` both mean empty
    #[serde(default, deserialize_with = "null_as_empty")]
    pub params: Params,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Params, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Params>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl OperationRequest {
    pub fn new(method: impl Into<String>) -> Self {
        OperationRequest {
            method: method.into(),
            params: Params::new(),
        }
    }

    /// Add a parameter
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

/// Client to server frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Operation request; answered with `mcp_response` or `error`
    McpRequest { request: OperationRequest },
    /// Keep-alive; answered with `pong`
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<Value>,
    },
}

impl ClientFrame {
    /// Parse a raw text frame
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| Error::MalformedRequest(format!("Invalid frame: {}", e)))
    }

    pub fn ping() -> Self {
        ClientFrame::Ping {
            timestamp: Some(Value::String(timestamp())),
        }
    }

    pub fn request(request: OperationRequest) -> Self {
        ClientFrame::McpRequest { request }
    }
}

/// Server to client frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerFrame {
    /// Sent once when a leg is accepted
    Connected {
        session_id: String,
        agent_id: String,
        timestamp: String,
    },
    /// Result of an `mcp_request`
    McpResponse { result: Value, timestamp: String },
    /// Reply to `ping`
    Pong { timestamp: String },
    /// Any failure; the leg stays open
    Error { error: String, timestamp: String },
}

impl ServerFrame {
    pub fn connected(session_id: impl Into<String>, agent_id: impl Into<String>) -> Self {
        ServerFrame::Connected {
            session_id: session_id.into(),
            agent_id: agent_id.into(),
            timestamp: timestamp(),
        }
    }

    pub fn response(result: Value) -> Self {
        ServerFrame::McpResponse {
            result,
            timestamp: timestamp(),
        }
    }

    pub fn pong() -> Self {
        ServerFrame::Pong {
            timestamp: timestamp(),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        ServerFrame::Error {
            error: error.into(),
            timestamp: timestamp(),
        }
    }

    /// Wire name of the frame type
    pub fn frame_type(&self) -> &'static str {
        match self {
            ServerFrame::Connected { .. } => "connected",
            ServerFrame::McpResponse { .. } => "mcp_response",
            ServerFrame::Pong { .. } => "pong",
            ServerFrame::Error { .. } => "error",
        }
    }

    /// Encode as a text frame
    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
