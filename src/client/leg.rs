//! WebSocket leg client
//!
//! Opens `/agent/{id}/websocket`, waits for the `connected` frame and keeps
//! the leg alive with periodic `ping` frames until closed.

use std::sync::Arc;
use std::time::Duration;

use backoff::ExponentialBackoff;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use url::Url;

use super::http::error_from_body;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::gateway::protocol::{ClientFrame, ErrorBody, OperationRequest, ServerFrame};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = Arc<Mutex<SplitSink<WsStream, Message>>>;

/// One message received on a leg
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// A protocol frame
    Frame(ServerFrame),
    /// Any other JSON, e.g. a broadcast
    Other(Value),
}

/// Build the leg URL for an agent from the gateway base URL
pub fn leg_url(base_url: &str, agent_id: &str) -> Result<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| Error::Config(format!("Invalid gateway URL {}: {}", base_url, e)))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(Error::Config(format!(
                "Unsupported gateway URL scheme: {}",
                other
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| Error::Config(format!("Cannot use {} for {}", scheme, base_url)))?;
    url.set_path(&format!("/agent/{}/websocket", agent_id));
    url.set_query(None);
    Ok(url)
}

/// A connected leg
pub struct LegClient {
    agent_id: String,
    session_id: String,
    sink: WsSink,
    stream: SplitStream<WsStream>,
    keepalive: Option<JoinHandle<()>>,
}

impl LegClient {
    /// Connect a leg, retrying transient failures with exponential backoff
    pub async fn connect(config: &ClientConfig, agent_id: &str) -> Result<Self> {
        let url = leg_url(&config.base_url, agent_id)?;
        let policy = ExponentialBackoff {
            initial_interval: Duration::from_millis(100),
            max_elapsed_time: Some(config.connect_timeout),
            ..ExponentialBackoff::default()
        };

        let url = &url;
        let socket = backoff::future::retry(policy, || async move {
            match connect_async(url.as_str()).await {
                Ok((socket, _)) => Ok(socket),
                Err(tungstenite::Error::Http(response)) => {
                    let status = response.status();
                    let text = response
                        .body()
                        .as_ref()
                        .map(|b| String::from_utf8_lossy(b).into_owned())
                        .unwrap_or_default();
                    let body = serde_json::from_str::<ErrorBody>(&text)
                        .unwrap_or_else(|_| ErrorBody::new(text));
                    let err = error_from_body(
                        reqwest::StatusCode::from_u16(status.as_u16())
                            .unwrap_or(reqwest::StatusCode::BAD_GATEWAY),
                        body,
                    );
                    if status.is_client_error() {
                        Err(backoff::Error::permanent(err))
                    } else {
                        Err(backoff::Error::transient(err))
                    }
                }
                Err(e) => {
                    debug!(url = %url, error = %e, "Leg connect failed, retrying");
                    Err(backoff::Error::transient(Error::WebSocket(e)))
                }
            }
        })
        .await?;

        let (sink, mut stream) = socket.split();
        let session_id = tokio::time::timeout(config.connect_timeout, wait_connected(&mut stream))
            .await
            .map_err(|_| Error::Transport("Timed out waiting for connected frame".into()))??;

        let sink = Arc::new(Mutex::new(sink));
        let keepalive = spawn_keepalive(sink.clone(), config.keepalive_interval);

        debug!(agent_id = %agent_id, session_id = %session_id, "Leg connected");
        Ok(LegClient {
            agent_id: agent_id.to_string(),
            session_id,
            sink,
            stream,
            keepalive: Some(keepalive),
        })
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Leg id announced by the gateway
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Send a frame
    pub async fn send(&self, frame: &ClientFrame) -> Result<()> {
        send_frame(&self.sink, frame).await
    }

    /// Send raw text, bypassing frame encoding
    pub async fn send_raw(&self, text: impl Into<String>) -> Result<()> {
        self.sink
            .lock()
            .await
            .send(Message::text(text.into()))
            .await?;
        Ok(())
    }

    /// Next message, `None` once the gateway closed the leg
    pub async fn recv(&mut self) -> Result<Option<Incoming>> {
        while let Some(message) = self.stream.next().await {
            match message? {
                Message::Text(text) => {
                    let value: Value = serde_json::from_str(text.as_str())?;
                    let incoming = match serde_json::from_value::<ServerFrame>(value.clone()) {
                        Ok(frame) => Incoming::Frame(frame),
                        Err(_) => Incoming::Other(value),
                    };
                    return Ok(Some(incoming));
                }
                Message::Close(_) => return Ok(None),
                _ => continue,
            }
        }
        Ok(None)
    }

    /// Dispatch an operation over the leg and wait for its answer.
    ///
    /// Keep-alive `pong`s and broadcasts arriving in between are skipped. The
    /// next `mcp_response` or `error` frame is taken as the answer, so calls on
    /// one leg must not overlap. The gateway refuses broadcasts that reuse a
    /// protocol frame `type`.
    pub async fn call(&mut self, request: OperationRequest) -> Result<Value> {
        self.send(&ClientFrame::request(request)).await?;
        loop {
            match self.next_reply().await? {
                ServerFrame::McpResponse { result, .. } => return Ok(result),
                ServerFrame::Error { error, .. } => return Err(Error::Remote(error)),
                _ => continue,
            }
        }
    }

    /// Round-trip a `ping`
    pub async fn ping(&mut self) -> Result<()> {
        self.send(&ClientFrame::ping()).await?;
        loop {
            match self.next_reply().await? {
                ServerFrame::Pong { .. } => return Ok(()),
                ServerFrame::Error { error, .. } => return Err(Error::Remote(error)),
                _ => continue,
            }
        }
    }

    async fn next_reply(&mut self) -> Result<ServerFrame> {
        loop {
            match self.recv().await? {
                Some(Incoming::Frame(frame)) => return Ok(frame),
                Some(Incoming::Other(value)) => {
                    debug!(message = %value, "Skipping non-protocol message");
                }
                None => return Err(Error::Transport("Leg closed by gateway".into())),
            }
        }
    }

    /// Close the leg
    pub async fn close(mut self) -> Result<()> {
        if let Some(keepalive) = self.keepalive.take() {
            keepalive.abort();
        }
        self.sink.lock().await.close().await?;
        Ok(())
    }
}

impl Drop for LegClient {
    fn drop(&mut self) {
        if let Some(keepalive) = self.keepalive.take() {
            keepalive.abort();
        }
    }
}

async fn send_frame(sink: &WsSink, frame: &ClientFrame) -> Result<()> {
    let text = serde_json::to_string(frame)?;
    sink.lock().await.send(Message::text(text)).await?;
    Ok(())
}

async fn wait_connected(stream: &mut SplitStream<WsStream>) -> Result<String> {
    while let Some(message) = stream.next().await {
        if let Message::Text(text) = message? {
            match serde_json::from_str::<ServerFrame>(text.as_str()) {
                Ok(ServerFrame::Connected { session_id, .. }) => return Ok(session_id),
                Ok(other) => debug!(frame = other.frame_type(), "Frame before connected"),
                Err(e) => warn!(error = %e, "Unexpected message before connected"),
            }
        }
    }
    Err(Error::Transport("Leg closed before connected frame".into()))
}

fn spawn_keepalive(sink: WsSink, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = send_frame(&sink, &ClientFrame::ping()).await {
                debug!(error = %e, "Keep-alive stopped");
                break;
            }
        }
    })
}
