//! Session registry
//!
//! Maps agent ids to their live `AgentSession`. Backed by a moka cache so
//! idle agents are dropped on a timer. An agent with an open leg is never
//! idle; its idle clock starts when the last leg closes. Dropping an agent
//! closes its legs, and a dropped agent is rehydrated from storage on its
//! next use.

use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::future::Cache;
use moka::notification::RemovalCause;
use moka::Expiry;
use tracing::{debug, info};

use super::agent::{AgentSession, LegId, LegReceiver};
use super::agent_id::validate_agent_id;
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::operations::OperationTable;
use crate::store::AgentStorage;

/// Idle expiry that is suspended while an agent has open legs.
///
/// moka re-evaluates the policy on insert and on every read, so the
/// registry reads the entry after each leg opens or closes.
struct IdlePolicy {
    idle: Duration,
}

impl IdlePolicy {
    fn expiry_for(&self, session: &AgentSession) -> Option<Duration> {
        if session.leg_count() > 0 {
            None
        } else {
            Some(self.idle)
        }
    }
}

impl Expiry<String, Arc<AgentSession>> for IdlePolicy {
    fn expire_after_create(
        &self,
        _agent_id: &String,
        session: &Arc<AgentSession>,
        _created_at: Instant,
    ) -> Option<Duration> {
        self.expiry_for(session)
    }

    fn expire_after_read(
        &self,
        _agent_id: &String,
        session: &Arc<AgentSession>,
        _read_at: Instant,
        _duration_until_expiry: Option<Duration>,
        _last_modified_at: Instant,
    ) -> Option<Duration> {
        self.expiry_for(session)
    }

    fn expire_after_update(
        &self,
        _agent_id: &String,
        session: &Arc<AgentSession>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        self.expiry_for(session)
    }
}

/// Registry of live agent sessions
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Cache<String, Arc<AgentSession>>,
    storage: Arc<dyn AgentStorage>,
    operations: Arc<OperationTable>,
    default_name: String,
}

impl SessionRegistry {
    pub fn new(
        storage: Arc<dyn AgentStorage>,
        operations: Arc<OperationTable>,
        config: &SessionConfig,
    ) -> Self {
        let mut builder = Cache::builder().eviction_listener(
            |agent_id: Arc<String>, session: Arc<AgentSession>, cause: RemovalCause| {
                if matches!(cause, RemovalCause::Replaced) {
                    return;
                }
                // a leg opened after the expiry was computed; it re-registers the session
                if matches!(cause, RemovalCause::Expired) && session.leg_count() > 0 {
                    debug!(agent_id = %agent_id, "Expired agent still has legs, keeping them");
                    return;
                }
                let closed = session.close_all_legs();
                info!(
                    agent_id = %agent_id,
                    cause = ?cause,
                    closed_legs = closed,
                    "Agent dropped from memory"
                );
            },
        );
        if let Some(idle) = config.idle_eviction {
            builder = builder.expire_after(IdlePolicy { idle });
        }

        SessionRegistry {
            sessions: builder.build(),
            storage,
            operations,
            default_name: config.default_agent_name.clone(),
        }
    }

    /// Create and register a new agent; a blank name gets the default
    pub async fn create(&self, name: Option<String>) -> Result<Arc<AgentSession>> {
        let name = name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| self.default_name.clone());
        let session = Arc::new(
            AgentSession::create(name, self.storage.clone(), self.operations.clone()).await?,
        );
        self.sessions
            .insert(session.id().to_string(), session.clone())
            .await;
        Ok(session)
    }

    /// Resolve an agent id to its live session.
    ///
    /// Fails with `InvalidAgentId` for malformed ids and `AgentNotFound` when
    /// nothing was ever created under the id.
    pub async fn resolve(&self, agent_id: &str) -> Result<Arc<AgentSession>> {
        validate_agent_id(agent_id)?;

        if let Some(session) = self.sessions.get(agent_id).await {
            return Ok(session);
        }

        let storage = self.storage.clone();
        let operations = self.operations.clone();
        let id = agent_id.to_string();
        let restored = self
            .sessions
            .try_get_with(agent_id.to_string(), async move {
                match AgentSession::restore(&id, storage, operations).await? {
                    Some(session) => Ok(Arc::new(session)),
                    None => Err(Error::AgentNotFound(id)),
                }
            })
            .await;

        restored.map_err(|e: Arc<Error>| match e.as_ref() {
            Error::AgentNotFound(id) => Error::AgentNotFound(id.clone()),
            other => Error::Transport(other.to_string()),
        })
    }

    /// Record activity on an agent, postponing its idle eviction
    pub async fn touch(&self, agent_id: &str) {
        let _ = self.sessions.get(agent_id).await;
    }

    /// Attach a new leg to `session`, suspending its idle eviction
    pub async fn open_leg(&self, session: &Arc<AgentSession>) -> (LegId, LegReceiver) {
        let leg = session.accept_connection();
        let live = session.clone();
        // re-reads the entry, or re-registers the session if it expired meanwhile
        self.sessions
            .get_with(session.id().to_string(), async move { live })
            .await;
        leg
    }

    /// Detach a leg; the agent's idle clock restarts once no legs remain
    pub async fn close_leg(&self, session: &AgentSession, leg_id: &str) -> bool {
        let closed = session.close_leg(leg_id);
        self.touch(session.id()).await;
        closed
    }

    /// Drop an agent from memory now, closing its legs
    pub async fn evict(&self, agent_id: &str) {
        self.sessions.invalidate(agent_id).await;
    }

    /// Number of agents currently held in memory
    pub fn live_count(&self) -> u64 {
        self.sessions.entry_count()
    }

    /// Run pending cache maintenance (expiry, eviction notifications)
    pub async fn run_pending_tasks(&self) {
        self.sessions.run_pending_tasks().await;
    }

    pub fn storage(&self) -> &Arc<dyn AgentStorage> {
        &self.storage
    }

    pub fn operations(&self) -> &Arc<OperationTable> {
        &self.operations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::LegCommand;
    use crate::store::MemoryStorage;
    use tokio::sync::mpsc::error::TryRecvError;

    fn registry_with(config: SessionConfig) -> SessionRegistry {
        SessionRegistry::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(OperationTable::builtin()),
            &config,
        )
    }

    #[tokio::test]
    async fn test_create_uses_default_name() {
        let registry = registry_with(SessionConfig::default());
        let session = registry.create(None).await.unwrap();
        assert_eq!(session.name(), "anonymous");

        let named = registry.create(Some("calc".into())).await.unwrap();
        assert_eq!(named.name(), "calc");

        let blank = registry.create(Some("  ".into())).await.unwrap();
        assert_eq!(blank.name(), "anonymous");
    }

    #[tokio::test]
    async fn test_resolve_returns_same_instance() {
        let registry = registry_with(SessionConfig::default());
        let created = registry.create(None).await.unwrap();
        let first = registry.resolve(created.id()).await.unwrap();
        let second = registry.resolve(created.id()).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&created, &first));
    }

    #[tokio::test]
    async fn test_resolve_errors() {
        let registry = registry_with(SessionConfig::default());
        assert!(matches!(
            registry.resolve("not-an-agent").await,
            Err(Error::InvalidAgentId(_))
        ));
        assert!(matches!(
            registry.resolve("agent-1-unknown").await,
            Err(Error::AgentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_evicted_agent_is_rehydrated() {
        let registry = registry_with(SessionConfig::default());
        let created = registry.create(Some("calc".into())).await.unwrap();
        let id = created.id().to_string();
        let (_leg, mut rx) = created.accept_connection();
        let _ = rx.try_recv();

        registry.evict(&id).await;
        registry.run_pending_tasks().await;
        let closed = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap();
        assert_eq!(closed, Some(LegCommand::Close));

        let restored = registry.resolve(&id).await.unwrap();
        assert!(!Arc::ptr_eq(&created, &restored));
        assert_eq!(restored.name(), "calc");
        assert_eq!(restored.leg_count(), 0);
    }

    #[tokio::test]
    async fn test_idle_agent_without_legs_is_dropped() {
        let registry = registry_with(SessionConfig {
            idle_eviction: Some(Duration::from_millis(50)),
            ..SessionConfig::default()
        });
        let session = registry.create(Some("calc".into())).await.unwrap();
        let id = session.id().to_string();

        tokio::time::sleep(Duration::from_millis(200)).await;
        registry.run_pending_tasks().await;
        assert_eq!(registry.live_count(), 0);

        let restored = registry.resolve(&id).await.unwrap();
        assert_eq!(restored.name(), "calc");
    }

    #[tokio::test]
    async fn test_open_leg_suspends_idle_eviction() {
        let registry = registry_with(SessionConfig {
            idle_eviction: Some(Duration::from_millis(50)),
            ..SessionConfig::default()
        });
        let session = registry.create(None).await.unwrap();
        let (leg, mut rx) = registry.open_leg(&session).await;
        assert!(matches!(rx.try_recv(), Ok(LegCommand::Text(_))));

        tokio::time::sleep(Duration::from_millis(200)).await;
        registry.run_pending_tasks().await;
        assert_eq!(registry.live_count(), 1);
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        let resolved = registry.resolve(session.id()).await.unwrap();
        assert!(Arc::ptr_eq(&session, &resolved));

        assert!(registry.close_leg(&session, &leg).await);
        tokio::time::sleep(Duration::from_millis(200)).await;
        registry.run_pending_tasks().await;
        assert_eq!(registry.live_count(), 0);
    }

    #[tokio::test]
    async fn test_idle_clock_waits_for_last_leg() {
        let registry = registry_with(SessionConfig {
            idle_eviction: Some(Duration::from_millis(50)),
            ..SessionConfig::default()
        });
        let session = registry.create(None).await.unwrap();
        let (first, _first_rx) = registry.open_leg(&session).await;
        let (second, _second_rx) = registry.open_leg(&session).await;

        registry.close_leg(&session, &first).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        registry.run_pending_tasks().await;
        assert_eq!(registry.live_count(), 1);

        registry.close_leg(&session, &second).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        registry.run_pending_tasks().await;
        assert_eq!(registry.live_count(), 0);
    }

    #[tokio::test]
    async fn test_live_count() {
        let registry = registry_with(SessionConfig::default());
        registry.create(None).await.unwrap();
        registry.create(None).await.unwrap();
        registry.run_pending_tasks().await;
        assert_eq!(registry.live_count(), 2);
    }
}
