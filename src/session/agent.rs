//! Agent session
//!
//! One `AgentSession` per live agent. It owns the agent's immutable record,
//! the set of open legs, and the dispatch entry point into the operation table.
//! Each leg is represented by the sending half of an unbounded channel; the
//! transport task holding the receiving half writes whatever arrives to the
//! socket.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::agent_id::generate_agent_id;
use crate::error::{Error, Result};
use crate::gateway::protocol::{ClientFrame, OperationRequest, ServerFrame};
use crate::operations::OperationTable;
use crate::store::{AgentStorage, AgentStore};

/// Storage key for the agent id
pub const AGENT_ID_KEY: &str = "agentId";
/// Storage key for the agent name
pub const NAME_KEY: &str = "name";

/// Identifier of one open leg
pub type LegId = String;

/// Instruction to a leg's transport task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegCommand {
    /// Write a text frame
    Text(String),
    /// Close the connection
    Close,
}

/// Receiving half handed to the transport task of a new leg
pub type LegReceiver = mpsc::UnboundedReceiver<LegCommand>;

/// Durable identity of an agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    pub agent_id: String,
    pub name: String,
}

/// A live agent
pub struct AgentSession {
    record: AgentRecord,
    store: AgentStore,
    operations: Arc<OperationTable>,
    legs: Mutex<HashMap<LegId, mpsc::UnboundedSender<LegCommand>>>,
}

impl AgentSession {
    /// Mint a new agent and persist its record.
    ///
    /// Retries id generation while the store already knows the id.
    pub async fn create(
        name: impl Into<String>,
        storage: Arc<dyn AgentStorage>,
        operations: Arc<OperationTable>,
    ) -> Result<Self> {
        let mut agent_id = generate_agent_id();
        while storage.exists(&agent_id).await? {
            debug!(agent_id = %agent_id, "Agent id collision, regenerating");
            agent_id = generate_agent_id();
        }

        let record = AgentRecord {
            agent_id,
            name: name.into(),
        };
        let store = AgentStore::new(storage, &record.agent_id);
        store.put(AGENT_ID_KEY, &record.agent_id).await?;
        store.put(NAME_KEY, &record.name).await?;

        info!(agent_id = %record.agent_id, name = %record.name, "Agent created");
        Ok(Self::from_parts(record, store, operations))
    }

    /// Rehydrate an agent from its persisted record, `None` if it never existed
    pub async fn restore(
        agent_id: &str,
        storage: Arc<dyn AgentStorage>,
        operations: Arc<OperationTable>,
    ) -> Result<Option<Self>> {
        let store = AgentStore::new(storage, agent_id);
        let Some(stored_id) = store.get::<String>(AGENT_ID_KEY).await? else {
            return Ok(None);
        };
        if stored_id != agent_id {
            return Err(Error::Storage(format!(
                "Record for {} carries id {}",
                agent_id, stored_id
            )));
        }
        let name = store.get::<String>(NAME_KEY).await?.unwrap_or_default();

        info!(agent_id = %agent_id, "Agent restored from storage");
        Ok(Some(Self::from_parts(
            AgentRecord {
                agent_id: stored_id,
                name,
            },
            store,
            operations,
        )))
    }

    fn from_parts(record: AgentRecord, store: AgentStore, operations: Arc<OperationTable>) -> Self {
        AgentSession {
            record,
            store,
            operations,
            legs: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.record.agent_id
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn record(&self) -> &AgentRecord {
        &self.record
    }

    pub fn store(&self) -> &AgentStore {
        &self.store
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Execute one operation request against the operation table
    pub fn dispatch(&self, request: &OperationRequest) -> Result<Value> {
        let outcome = self.operations.execute(&request.method, &request.params);
        if let Err(ref e) = outcome {
            debug!(
                agent_id = %self.record.agent_id,
                method = %request.method,
                kind = %e.kind(),
                error = %e,
                "Dispatch failed"
            );
        }
        outcome
    }

    /// Answer one raw client frame
    pub fn handle_frame(&self, raw: &str) -> ServerFrame {
        match ClientFrame::parse(raw) {
            Ok(ClientFrame::McpRequest { request }) => match self.dispatch(&request) {
                Ok(result) => ServerFrame::response(result),
                Err(e) => ServerFrame::error(e.to_string()),
            },
            Ok(ClientFrame::Ping { .. }) => ServerFrame::pong(),
            Err(e) => ServerFrame::error(e.to_string()),
        }
    }

    // ========================================================================
    // Legs
    // ========================================================================

    /// Register a new leg and announce it with a `connected` frame
    pub fn accept_connection(&self) -> (LegId, LegReceiver) {
        let leg_id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        self.legs.lock().insert(leg_id.clone(), tx);

        info!(agent_id = %self.record.agent_id, leg_id = %leg_id, "Leg accepted");
        self.send_frame(&leg_id, &ServerFrame::connected(&leg_id, &self.record.agent_id));
        (leg_id, rx)
    }

    /// Handle a text frame received on a leg; the reply goes back on the same leg
    pub fn on_leg_message(&self, leg_id: &str, raw: &str) {
        let reply = self.handle_frame(raw);
        self.send_frame(leg_id, &reply);
    }

    /// Send an `error` frame on a leg
    pub fn reply_error(&self, leg_id: &str, message: impl Into<String>) {
        self.send_frame(leg_id, &ServerFrame::error(message));
    }

    /// Forget a leg. Returns `false` if it was already gone.
    pub fn close_leg(&self, leg_id: &str) -> bool {
        let removed = self.legs.lock().remove(leg_id).is_some();
        if removed {
            info!(agent_id = %self.record.agent_id, leg_id = %leg_id, "Leg closed");
        }
        removed
    }

    /// Ask one leg to close and forget it
    pub fn disconnect_leg(&self, leg_id: &str) -> bool {
        let Some(tx) = self.legs.lock().remove(leg_id) else {
            return false;
        };
        let _ = tx.send(LegCommand::Close);
        info!(agent_id = %self.record.agent_id, leg_id = %leg_id, "Leg disconnected");
        true
    }

    /// Forget a leg after a transport error
    pub fn on_leg_error(&self, leg_id: &str, error: &str) -> bool {
        warn!(agent_id = %self.record.agent_id, leg_id = %leg_id, error = %error, "Leg error");
        self.close_leg(leg_id)
    }

    /// Send a message to every open leg, returning how many accepted it.
    ///
    /// Legs whose transport has gone away are pruned.
    pub fn broadcast(&self, message: &Value) -> usize {
        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(e) => {
                warn!(agent_id = %self.record.agent_id, error = %e, "Broadcast not serializable");
                return 0;
            }
        };

        let mut legs = self.legs.lock();
        let mut dead = Vec::new();
        let mut delivered = 0;
        for (leg_id, tx) in legs.iter() {
            if tx.send(LegCommand::Text(text.clone())).is_ok() {
                delivered += 1;
            } else {
                dead.push(leg_id.clone());
            }
        }
        for leg_id in dead {
            legs.remove(&leg_id);
            debug!(agent_id = %self.record.agent_id, leg_id = %leg_id, "Pruned dead leg");
        }
        delivered
    }

    /// Ask every open leg to close and forget them all
    pub fn close_all_legs(&self) -> usize {
        let drained: Vec<_> = self.legs.lock().drain().collect();
        for (_, tx) in &drained {
            let _ = tx.send(LegCommand::Close);
        }
        drained.len()
    }

    pub fn leg_count(&self) -> usize {
        self.legs.lock().len()
    }

    pub fn leg_ids(&self) -> Vec<LegId> {
        self.legs.lock().keys().cloned().collect()
    }

    /// Queue a frame on a leg. Frames for legs that are already gone are
    /// discarded.
    fn send_frame(&self, leg_id: &str, frame: &ServerFrame) -> bool {
        let text = match frame.to_text() {
            Ok(text) => text,
            Err(e) => {
                warn!(leg_id = %leg_id, error = %e, "Failed to encode frame");
                return false;
            }
        };

        let mut legs = self.legs.lock();
        let Some(tx) = legs.get(leg_id) else {
            debug!(
                leg_id = %leg_id,
                frame = frame.frame_type(),
                "Discarding frame for closed leg"
            );
            return false;
        };
        if tx.send(LegCommand::Text(text)).is_err() {
            legs.remove(leg_id);
            debug!(leg_id = %leg_id, "Leg transport gone, removed");
            return false;
        }
        true
    }
}

impl std::fmt::Debug for AgentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSession")
            .field("record", &self.record)
            .field("legs", &self.leg_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::is_valid_agent_id;
    use crate::store::MemoryStorage;
    use serde_json::json;

    async fn new_session() -> AgentSession {
        AgentSession::create(
            "calc",
            Arc::new(MemoryStorage::new()),
            Arc::new(OperationTable::builtin()),
        )
        .await
        .unwrap()
    }

    fn next_frame(rx: &mut LegReceiver) -> Value {
        match rx.try_recv().unwrap() {
            LegCommand::Text(text) => serde_json::from_str(&text).unwrap(),
            LegCommand::Close => panic!("Expected a text frame"),
        }
    }

    #[tokio::test]
    async fn test_create_persists_record() {
        let storage: Arc<dyn AgentStorage> = Arc::new(MemoryStorage::new());
        let ops = Arc::new(OperationTable::builtin());
        let session = AgentSession::create("calc", storage.clone(), ops.clone())
            .await
            .unwrap();
        assert!(is_valid_agent_id(session.id()));

        let restored = AgentSession::restore(session.id(), storage.clone(), ops.clone())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(restored.record(), session.record());
        assert_eq!(restored.name(), "calc");

        let missing = AgentSession::restore("agent-1-missing", storage, ops)
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_same_name_gives_distinct_ids() {
        let storage: Arc<dyn AgentStorage> = Arc::new(MemoryStorage::new());
        let ops = Arc::new(OperationTable::builtin());
        let a = AgentSession::create("twin", storage.clone(), ops.clone())
            .await
            .unwrap();
        let b = AgentSession::create("twin", storage, ops).await.unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_dispatch_power() {
        let session = new_session().await;
        let result = session
            .dispatch(
                &OperationRequest::new("power")
                    .with_param("base", 2)
                    .with_param("exponent", 10),
            )
            .unwrap();
        assert_eq!(
            result,
            json!({"result": 1024.0, "operation": "power", "base": 2.0, "exponent": 10.0})
        );
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_tagged() {
        let session = new_session().await;
        let err = session
            .dispatch(&OperationRequest::new("divide").with_param("a", 1).with_param("b", 0))
            .unwrap_err();
        assert_eq!(err.method(), Some("divide"));
        assert_eq!(err.to_string(), "Cannot divide by zero");
    }

    #[tokio::test]
    async fn test_accept_connection_announces_leg() {
        let session = new_session().await;
        let (leg_id, mut rx) = session.accept_connection();
        let frame = next_frame(&mut rx);
        assert_eq!(frame["type"], "connected");
        assert_eq!(frame["sessionId"], leg_id.as_str());
        assert_eq!(frame["agentId"], session.id());
        assert_eq!(session.leg_count(), 1);
    }

    #[tokio::test]
    async fn test_leg_messages() {
        let session = new_session().await;
        let (leg_id, mut rx) = session.accept_connection();
        next_frame(&mut rx);

        session.on_leg_message(&leg_id, r#"{"type":"ping","timestamp":"t"}"#);
        assert_eq!(next_frame(&mut rx)["type"], "pong");

        session.on_leg_message(
            &leg_id,
            r#"{"type":"mcp_request","request":{"method":"add","params":{"a":2,"b":3}}}"#,
        );
        let response = next_frame(&mut rx);
        assert_eq!(response["type"], "mcp_response");
        assert_eq!(response["result"]["result"], 5.0);

        session.on_leg_message(&leg_id, "garbage");
        assert_eq!(next_frame(&mut rx)["type"], "error");

        session.on_leg_message(
            &leg_id,
            r#"{"type":"mcp_request","request":{"method":"sqrt","params":{"value":-4}}}"#,
        );
        let error = next_frame(&mut rx);
        assert_eq!(error["type"], "error");
        assert_eq!(
            error["error"],
            "Cannot calculate square root of a negative number"
        );

        // still usable after errors
        session.on_leg_message(&leg_id, r#"{"type":"ping"}"#);
        assert_eq!(next_frame(&mut rx)["type"], "pong");
    }

    #[tokio::test]
    async fn test_legs_are_independent() {
        let session = new_session().await;
        let (first, mut first_rx) = session.accept_connection();
        let (second, mut second_rx) = session.accept_connection();
        assert_ne!(first, second);
        next_frame(&mut first_rx);
        next_frame(&mut second_rx);

        session.on_leg_message(&second, r#"{"type":"ping"}"#);
        assert!(first_rx.try_recv().is_err());
        assert_eq!(next_frame(&mut second_rx)["type"], "pong");
    }

    #[tokio::test]
    async fn test_close_leg_is_idempotent_and_discards_late_replies() {
        let session = new_session().await;
        let (leg_id, _rx) = session.accept_connection();
        assert!(session.close_leg(&leg_id));
        assert!(!session.close_leg(&leg_id));
        assert!(!session.on_leg_error(&leg_id, "reset"));

        session.on_leg_message(&leg_id, r#"{"type":"ping"}"#);
        assert_eq!(session.leg_count(), 0);
    }

    #[tokio::test]
    async fn test_broadcast_skips_dead_legs() {
        let session = new_session().await;
        let (_a, mut a_rx) = session.accept_connection();
        let (_b, b_rx) = session.accept_connection();
        next_frame(&mut a_rx);
        drop(b_rx);

        let delivered = session.broadcast(&json!({"type": "notice", "text": "hi"}));
        assert_eq!(delivered, 1);
        assert_eq!(next_frame(&mut a_rx)["text"], "hi");
        assert_eq!(session.leg_count(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_leg_sends_close() {
        let session = new_session().await;
        let (leg_id, mut rx) = session.accept_connection();
        next_frame(&mut rx);
        assert!(session.disconnect_leg(&leg_id));
        assert_eq!(rx.try_recv().unwrap(), LegCommand::Close);
        assert!(!session.disconnect_leg(&leg_id));
    }

    #[tokio::test]
    async fn test_close_all_legs_sends_close() {
        let session = new_session().await;
        let (_a, mut rx) = session.accept_connection();
        next_frame(&mut rx);
        assert_eq!(session.close_all_legs(), 1);
        assert_eq!(rx.try_recv().unwrap(), LegCommand::Close);
        assert_eq!(session.leg_count(), 0);
    }
}
