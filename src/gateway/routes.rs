//! HTTP route handlers

use std::any::Any;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{error, warn};

use super::protocol::{
    timestamp, AgentInfoResponse, AgentMcpRequest, BroadcastRequest, BroadcastResponse,
    CreateAgentRequest, CreateAgentResponse, ErrorBody, McpHttpRequest, McpHttpResponse,
    OperationRequest, StatusResponse, SERVER_FRAME_TYPES,
};
use super::AppState;
use crate::error::{Error, ErrorKind};
use crate::session::{is_valid_agent_id, AgentSession};

// ---- Error Handling ----

/// Handler error rendered as `{error, kind}`
pub(crate) struct ApiError(Error);

impl ApiError {
    /// HTTP status for the wrapped error.
    ///
    /// Operation failures (`InvalidArgument`, `DomainError`, `DivisionByZero`,
    /// `UnknownMethod`) answer 400, not 500; clients read the 4xx/5xx split as
    /// bad input versus gateway fault. Only `AgentNotFound` is 404.
    fn status(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::AgentNotFound => StatusCode::NOT_FOUND,
            _ if self.0.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }
        // 404 bodies carry only the message
        let body = if matches!(self.0, Error::AgentNotFound(_)) {
            ErrorBody::new(self.0.to_string())
        } else {
            ErrorBody::from(&self.0)
        };
        (status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody::new(message))).into_response()
}

/// Parse a JSON body; an empty body reads as `{}`
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| Error::MalformedRequest(format!("Invalid JSON body: {}", e)))
}

/// Validate the loosely-typed `request` member of an MCP body
fn operation_request(raw: Option<Value>) -> Result<OperationRequest, Error> {
    let invalid = || Error::MalformedRequest("Invalid MCP request".to_string());
    let raw = raw.ok_or_else(invalid)?;
    let has_method = raw
        .get("method")
        .and_then(Value::as_str)
        .is_some_and(|m| !m.is_empty());
    if !has_method {
        return Err(invalid());
    }
    serde_json::from_value(raw).map_err(|_| invalid())
}

fn dispatch_response(session: &AgentSession, request: &OperationRequest) -> ApiResult<Response> {
    let result = session.dispatch(request)?;
    Ok(Json(McpHttpResponse {
        result,
        timestamp: timestamp(),
    })
    .into_response())
}

// ---- Agents ----

pub(crate) async fn create_agent(State(state): State<AppState>, body: Bytes) -> Response {
    let request: CreateAgentRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(e) => return ApiError(e).into_response(),
    };

    match state.registry.create(request.display_name()).await {
        Ok(session) => Json(CreateAgentResponse {
            agent_id: session.id().to_string(),
        })
        .into_response(),
        Err(e) => {
            error!(error = %e, "Agent creation failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error creating agent: {}", e),
            )
        }
    }
}

pub(crate) async fn agent_info(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> ApiResult<Json<AgentInfoResponse>> {
    let session = state.registry.resolve(&agent_id).await?;
    Ok(Json(AgentInfoResponse {
        agent_id: session.id().to_string(),
        name: session.name().to_string(),
        connections: session.leg_count(),
    }))
}

pub(crate) async fn broadcast(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<BroadcastResponse>> {
    let session = state.registry.resolve(&agent_id).await?;
    let request: BroadcastRequest = serde_json::from_slice(&body)
        .map_err(|e| Error::MalformedRequest(format!("Invalid broadcast body: {}", e)))?;
    if !request.message.is_object() {
        return Err(Error::MalformedRequest("Broadcast message must be an object".into()).into());
    }
    if let Some(kind) = request.message.get("type").and_then(Value::as_str) {
        if SERVER_FRAME_TYPES.contains(&kind) {
            return Err(Error::MalformedRequest(format!(
                "Broadcast type '{}' is reserved for protocol frames",
                kind
            ))
            .into());
        }
    }

    let delivered = session.broadcast(&request.message);
    Ok(Json(BroadcastResponse { delivered }))
}

// ---- Operations ----

pub(crate) async fn mcp(State(state): State<AppState>, body: Bytes) -> ApiResult<Response> {
    let body: McpHttpRequest = parse_body(&body)?;

    let agent_id = match body.agent_id {
        Some(Value::String(id)) if is_valid_agent_id(&id) => id,
        _ => return Err(Error::InvalidAgentId(String::new()).into()),
    };
    let request = operation_request(body.request)?;

    let session = state.registry.resolve(&agent_id).await?;
    dispatch_response(&session, &request)
}

pub(crate) async fn agent_mcp(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    body: Bytes,
) -> ApiResult<Response> {
    let session = state.registry.resolve(&agent_id).await?;
    let body: AgentMcpRequest = parse_body(&body)?;
    let request = operation_request(body.request)?;
    dispatch_response(&session, &request)
}

// ---- Status ----

pub(crate) async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let agent_count = if state.report_live_count {
        state.registry.live_count()
    } else {
        0
    };
    Json(StatusResponse {
        status: "ok".to_string(),
        timestamp: timestamp(),
        agent_count,
    })
}

// ---- Fallbacks ----

pub(crate) async fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

pub(crate) fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "An unknown error occurred".to_string()
    };
    warn!(panic = %message, "Handler panicked");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operation_request_validation() {
        assert!(operation_request(None).is_err());
        assert!(operation_request(Some(json!({"params": {}}))).is_err());
        assert!(operation_request(Some(json!({"method": ""}))).is_err());
        assert!(operation_request(Some(json!({"method": 3}))).is_err());
        assert!(operation_request(Some(json!({"method": "add", "params": [1, 2]}))).is_err());

        let ok = operation_request(Some(json!({"method": "add", "params": {"a": 1}}))).unwrap();
        assert_eq!(ok.method, "add");
        assert_eq!(ok.params["a"], 1);
    }

    #[test]
    fn test_empty_body_is_default() {
        let parsed: CreateAgentRequest = parse_body(&Bytes::from_static(b"  ")).unwrap();
        assert!(parsed.name.is_none());
        assert!(parse_body::<CreateAgentRequest>(&Bytes::from_static(b"{")).is_err());
    }

    #[test]
    fn test_api_error_status() {
        assert_eq!(
            ApiError(Error::AgentNotFound("agent-1-a".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError(Error::InvalidAgentId("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError(Error::DivisionByZero.in_method("divide")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError(Error::Domain("Cannot calculate square root of negative number".into()).in_method("sqrt")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError(Error::UnknownMethod("nope".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError(Error::Storage("disk".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_panic_payload_becomes_message() {
        let response = handle_panic(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
