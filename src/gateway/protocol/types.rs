//! Gateway HTTP types
//!
//! Request/response bodies for the HTTP routes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, ErrorKind};

// ============================================================================
// Agents
// ============================================================================

/// `POST /agent` body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgentRequest {
    /// Display label; any JSON value is accepted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<Value>,
}

impl CreateAgentRequest {
    pub fn named(name: impl Into<String>) -> Self {
        CreateAgentRequest {
            name: Some(Value::String(name.into())),
        }
    }

    /// The requested name, or `None` when the configured placeholder applies.
    ///
    /// Blank strings, `null`, `false` and `0` count as absent; other
    /// non-string values are kept as their JSON text.
    pub fn display_name(&self) -> Option<String> {
        match self.name.as_ref()? {
            Value::Null | Value::Bool(false) => None,
            Value::String(name) if name.trim().is_empty() => None,
            Value::String(name) => Some(name.clone()),
            Value::Number(n) if n.as_f64() == Some(0.0) => None,
            other => Some(other.to_string()),
        }
    }
}

/// `POST /agent` response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgentResponse {
    pub agent_id: String,
}

/// `GET /agent/{id}` response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInfoResponse {
    pub agent_id: String,
    pub name: String,
    /// Currently open legs
    pub connections: usize,
}

// ============================================================================
// Operations
// ============================================================================

/// `POST /mcp` body.
///
/// Fields are loosely typed so that shape errors can be reported with the
/// gateway's own messages rather than a deserializer's.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpHttpRequest {
    #[serde(default)]
    pub agent_id: Option<Value>,
    #[serde(default)]
    pub request: Option<Value>,
}

/// `POST /agent/{id}/mcp` body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentMcpRequest {
    #[serde(default)]
    pub request: Option<Value>,
}

/// Successful dispatch over HTTP
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpHttpResponse {
    pub result: Value,
    pub timestamp: String,
}

// ============================================================================
// Broadcast
// ============================================================================

/// `POST /agent/{id}/broadcast` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastRequest {
    pub message: Value,
}

/// `POST /agent/{id}/broadcast` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastResponse {
    /// Legs the message was handed to
    pub delivered: usize,
}

// ============================================================================
// Status and errors
// ============================================================================

/// `GET /status` response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: String,
    pub timestamp: String,
    pub agent_count: u64,
}

/// Body of every HTTP error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        ErrorBody {
            error: error.into(),
            kind: None,
        }
    }
}

impl From<&Error> for ErrorBody {
    fn from(err: &Error) -> Self {
        ErrorBody {
            error: err.to_string(),
            kind: Some(err.kind()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_agent_request_name_optional() {
        let req: CreateAgentRequest = serde_json::from_str("{}").unwrap();
        assert!(req.display_name().is_none());
        let req: CreateAgentRequest = serde_json::from_str(r#"{"name":"calc"}"#).unwrap();
        assert_eq!(req.display_name().as_deref(), Some("calc"));
    }

    #[test]
    fn test_blank_and_falsy_names_fall_back() {
        for raw in [
            r#"{"name":""}"#,
            r#"{"name":"   "}"#,
            r#"{"name":null}"#,
            r#"{"name":false}"#,
            r#"{"name":0}"#,
        ] {
            let req: CreateAgentRequest = serde_json::from_str(raw).unwrap();
            assert_eq!(req.display_name(), None, "{raw}");
        }
    }

    #[test]
    fn test_non_string_name_is_accepted() {
        let req: CreateAgentRequest = serde_json::from_str(r#"{"name":42}"#).unwrap();
        assert_eq!(req.display_name().as_deref(), Some("42"));
        let req: CreateAgentRequest = serde_json::from_str(r#"{"name":true}"#).unwrap();
        assert_eq!(req.display_name().as_deref(), Some("true"));
    }

    #[test]
    fn test_camel_case_fields() {
        let json = serde_json::to_value(CreateAgentResponse {
            agent_id: "agent-1-a".to_string(),
        })
        .unwrap();
        assert_eq!(json["agentId"], "agent-1-a");

        let status = serde_json::to_value(StatusResponse {
            status: "ok".to_string(),
            timestamp: "t".to_string(),
            agent_count: 0,
        })
        .unwrap();
        assert_eq!(status["agentCount"], 0);
    }

    #[test]
    fn test_error_body_from_error() {
        let body = ErrorBody::from(&Error::AgentNotFound("agent-1-a".into()));
        let json = serde_json::to_value(body).unwrap();
        assert_eq!(json["error"], "Agent not found");
        assert_eq!(json["kind"], "AgentNotFound");
    }
}
