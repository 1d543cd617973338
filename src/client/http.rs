//! HTTP gateway client

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::gateway::protocol::{
    AgentInfoResponse, BroadcastRequest, BroadcastResponse, CreateAgentRequest,
    CreateAgentResponse, ErrorBody, McpHttpRequest, McpHttpResponse, OperationRequest, StatusResponse,
};

/// Client for the gateway's HTTP routes
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: Url,
}

impl GatewayClient {
    /// Create a client from configuration
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| Error::Config(format!("Invalid gateway URL {}: {}", config.base_url, e)))?;
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("mathagent/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(GatewayClient { client, base_url })
    }

    /// Create a client for `base_url` with default settings
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        Self::new(&ClientConfig {
            base_url: base_url.into(),
            ..ClientConfig::default()
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("Invalid endpoint {}: {}", path, e)))
    }

    /// Create an agent, returning its id
    pub async fn create_agent(&self, name: Option<&str>) -> Result<String> {
        let body = match name {
            Some(name) => CreateAgentRequest::named(name),
            None => CreateAgentRequest::default(),
        };
        let response: CreateAgentResponse = self.post("/agent", &body).await?;
        Ok(response.agent_id)
    }

    /// Dispatch an operation on an agent, returning the operation's result
    pub async fn call(&self, agent_id: &str, request: &OperationRequest) -> Result<Value> {
        let body = McpHttpRequest {
            agent_id: Some(Value::String(agent_id.to_string())),
            request: Some(serde_json::to_value(request)?),
        };
        let response: McpHttpResponse = self.post("/mcp", &body).await?;
        Ok(response.result)
    }

    /// Fetch the operation catalog through an agent
    pub async fn discover(&self, agent_id: &str) -> Result<Value> {
        self.call(agent_id, &OperationRequest::new("discover")).await
    }

    pub async fn status(&self) -> Result<StatusResponse> {
        self.get("/status").await
    }

    pub async fn agent_info(&self, agent_id: &str) -> Result<AgentInfoResponse> {
        self.get(&format!("/agent/{}", agent_id)).await
    }

    /// Push a message to every open leg of an agent
    pub async fn broadcast(&self, agent_id: &str, message: Value) -> Result<usize> {
        let response: BroadcastResponse = self
            .post(
                &format!("/agent/{}/broadcast", agent_id),
                &BroadcastRequest { message },
            )
            .await?;
        Ok(response.delivered)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path)?;
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        read_response(response).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.endpoint(path)?;
        debug!("POST {}", url);
        let response = self.client.post(url).json(body).send().await?;
        read_response(response).await
    }
}

async fn read_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let text = response.text().await.unwrap_or_default();
    let body = serde_json::from_str::<ErrorBody>(&text).unwrap_or_else(|_| ErrorBody::new(text));
    Err(error_from_body(status, body))
}

/// Rebuild a typed error from a gateway error response
pub(crate) fn error_from_body(status: StatusCode, body: ErrorBody) -> Error {
    let message = body.error;
    match body.kind {
        Some(ErrorKind::InvalidArgument) => Error::InvalidArgument(message),
        Some(ErrorKind::DomainError) => Error::Domain(message),
        Some(ErrorKind::DivisionByZero) => Error::DivisionByZero,
        Some(ErrorKind::UnknownMethod) => Error::UnknownMethod(
            message
                .strip_prefix("Unknown method: ")
                .unwrap_or(&message)
                .to_string(),
        ),
        Some(ErrorKind::InvalidAgentId) => Error::InvalidAgentId(message),
        Some(ErrorKind::AgentNotFound) => Error::AgentNotFound(message),
        Some(ErrorKind::MalformedRequest) => Error::MalformedRequest(message),
        Some(ErrorKind::TransportFailure) | Some(ErrorKind::Internal) => Error::Transport(message),
        None => match status {
            StatusCode::NOT_FOUND if message == "Agent not found" => Error::AgentNotFound(message),
            StatusCode::BAD_REQUEST if message == "Invalid agent ID" => {
                Error::InvalidAgentId(message)
            }
            StatusCode::BAD_REQUEST => Error::MalformedRequest(message),
            _ => Error::Transport(format!("HTTP {}: {}", status, message)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> GatewayClient {
        GatewayClient::with_base_url(server.uri()).unwrap()
    }

    #[tokio::test]
    async fn test_create_agent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/agent"))
            .and(body_json(json!({"name": "calc"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"agentId": "agent-1-abc"})))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        assert_eq!(client.create_agent(Some("calc")).await.unwrap(), "agent-1-abc");
    }

    #[tokio::test]
    async fn test_call_returns_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mcp"))
            .and(body_json(json!({
                "agentId": "agent-1-abc",
                "request": {"method": "add", "params": {"a": 1, "b": 2}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"result": 3.0, "operation": "add", "a": 1.0, "b": 2.0},
                "timestamp": "2025-01-01T00:00:00.000Z"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let result = client
            .call(
                "agent-1-abc",
                &OperationRequest::new("add").with_param("a", 1).with_param("b", 2),
            )
            .await
            .unwrap();
        assert_eq!(result["result"], 3.0);
    }

    #[tokio::test]
    async fn test_error_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/agent/agent-1-gone"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "Agent not found"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/mcp"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "Unknown method: modulo",
                "kind": "UnknownMethod"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        assert!(matches!(
            client.agent_info("agent-1-gone").await,
            Err(Error::AgentNotFound(_))
        ));
        match client.call("agent-1-abc", &OperationRequest::new("modulo")).await {
            Err(Error::UnknownMethod(name)) => assert_eq!(name, "modulo"),
            other => panic!("Expected UnknownMethod, got {:?}", other),
        }
        match client.status().await {
            Err(Error::Transport(message)) => assert!(message.contains("overloaded")),
            other => panic!("Expected Transport, got {:?}", other),
        }
    }

    #[test]
    fn test_error_from_body_without_kind() {
        let err = error_from_body(StatusCode::BAD_REQUEST, ErrorBody::new("Invalid agent ID"));
        assert!(matches!(err, Error::InvalidAgentId(_)));
        let err = error_from_body(StatusCode::BAD_REQUEST, ErrorBody::new("Invalid MCP request"));
        assert!(matches!(err, Error::MalformedRequest(_)));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            GatewayClient::with_base_url("not a url"),
            Err(Error::Config(_))
        ));
    }
}
