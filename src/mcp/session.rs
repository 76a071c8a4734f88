//! Session store for the streamable-HTTP transport.
//!
//! Each session owns one [`McpEngine`] behind an async mutex, so requests on a
//! session run one at a time in arrival order while sessions stay
//! independent. Last-activity is an atomic outside that lock and can be
//! touched without waiting for an in-flight request.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::mcp::engine::McpEngine;
use crate::mcp::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use crate::tools::ToolRegistry;

/// Lifetime limits applied by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Sessions idle longer than this are evicted.
    pub idle_timeout: Duration,
    /// Upper bound on live sessions.
    pub max_sessions: usize,
}

impl From<&SessionConfig> for SessionPolicy {
    fn from(config: &SessionConfig) -> Self {
        Self {
            idle_timeout: config.idle_timeout(),
            max_sessions: config.max_sessions,
        }
    }
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

/// One client session.
#[derive(Debug)]
pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    /// Microseconds since the Unix epoch.
    last_activity: AtomicI64,
    engine: Mutex<McpEngine>,
}

impl Session {
    fn new(id: String, engine: McpEngine) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            last_activity: AtomicI64::new(now.timestamp_micros()),
            engine: Mutex::new(engine),
        }
    }

    /// The session id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// When the session was created.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the session last saw a request or notification.
    #[must_use]
    pub fn last_activity(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_micros(self.last_activity.load(Ordering::Relaxed))
            .unwrap_or(self.created_at)
    }

    /// Records activity now. Never moves backwards.
    pub fn touch(&self) {
        self.last_activity
            .fetch_max(Utc::now().timestamp_micros(), Ordering::Relaxed);
    }

    fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_activity()).to_std().unwrap_or_default()
    }
}

/// Result of [`SessionStore::dispatch`].
#[derive(Debug)]
pub struct Dispatched {
    /// The JSON-RPC reply.
    pub reply: Result<JsonRpcResponse, JsonRpcError>,
    /// Id of the session created by this request, if any.
    pub created: Option<String>,
}

/// Concurrent map of live sessions.
pub struct SessionStore {
    sessions: DashMap<String, Arc<Session>>,
    registry: Arc<ToolRegistry>,
    policy: SessionPolicy,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &self.sessions.len())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>, policy: SessionPolicy) -> Self {
        Self {
            sessions: DashMap::new(),
            registry,
            policy,
        }
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether there are no live sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Looks a session up by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Routes a request to its session, creating one on `initialize`.
    pub async fn dispatch(
        &self,
        session_id: Option<&str>,
        req: &JsonRpcRequest,
        token: Option<&str>,
    ) -> Dispatched {
        if let Some(session) = session_id.and_then(|id| self.get(id)) {
            session.touch();
            tracing::debug!(session = session.id(), method = %req.method, "Request");
            let reply = session.engine.lock().await.handle_request(req, token).await;
            return Dispatched {
                reply,
                created: None,
            };
        }

        if req.method != "initialize" {
            tracing::debug!(session = ?session_id, method = %req.method, "Request without a live session");
            return Dispatched {
                reply: Err(JsonRpcError::no_session(
                    Some(req.id.clone()),
                    "No session and not initialize",
                )),
                created: None,
            };
        }

        let mut engine = McpEngine::new(Arc::clone(&self.registry));
        let reply = engine.handle_request(req, token).await;
        if reply.is_err() {
            return Dispatched {
                reply,
                created: None,
            };
        }

        let id = Uuid::new_v4().to_string();
        self.make_room();
        self.sessions
            .insert(id.clone(), Arc::new(Session::new(id.clone(), engine)));
        tracing::info!(session = %id, active = self.len(), "Session created");

        Dispatched {
            reply,
            created: Some(id),
        }
    }

    /// Touches a known session. Returns whether it was known.
    pub fn notify(&self, session_id: Option<&str>) -> bool {
        match session_id.and_then(|id| self.get(id)) {
            Some(session) => {
                session.touch();
                true
            }
            None => false,
        }
    }

    /// Removes every session idle longer than the policy allows.
    ///
    /// Returns the number evicted.
    pub fn evict_idle(&self) -> usize {
        let now = Utc::now();
        let timeout = self.policy.idle_timeout;
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| session.idle_for(now) <= timeout);
        let evicted = before.saturating_sub(self.sessions.len());
        if evicted > 0 {
            tracing::info!(evicted, active = self.len(), "Evicted idle sessions");
        }
        evicted
    }

    /// Frees a slot for a new session if the store is full.
    fn make_room(&self) {
        if self.sessions.len() < self.policy.max_sessions {
            return;
        }

        self.evict_idle();

        while self.sessions.len() >= self.policy.max_sessions {
            let oldest = self
                .sessions
                .iter()
                .min_by_key(|entry| entry.value().last_activity.load(Ordering::Relaxed))
                .map(|entry| entry.key().clone());

            let Some(id) = oldest else { break };
            self.sessions.remove(&id);
            tracing::warn!(session = %id, "Session limit reached, evicted least recently active");
        }
    }

    /// Spawns a task that evicts idle sessions every `every`.
    #[must_use]
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                store.evict_idle();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::error::UpstreamError;
    use crate::mcp::protocol::{RequestId, NO_SESSION_CODE};
    use crate::tushare::{DataProvider, QueryParams, Record};

    struct Empty;

    #[async_trait]
    impl DataProvider for Empty {
        async fn query(
            &self,
            _token: Option<&str>,
            _api_name: &str,
            _params: &QueryParams,
        ) -> Result<Vec<Record>, UpstreamError> {
            Ok(Vec::new())
        }
    }

    fn store(policy: SessionPolicy) -> SessionStore {
        let registry = ToolRegistry::with_catalogue(Arc::new(Empty)).unwrap();
        SessionStore::new(Arc::new(registry), policy)
    }

    fn request(id: i64, method: &str) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: RequestId::Number(id),
            method: method.to_string(),
            params: Some(json!({})),
        }
    }

    async fn open(store: &SessionStore) -> String {
        store
            .dispatch(None, &request(0, "initialize"), None)
            .await
            .created
            .unwrap()
    }

    #[tokio::test]
    async fn initialize_creates_unique_sessions() {
        let store = store(SessionPolicy::default());
        let a = open(&store).await;
        let b = open(&store).await;
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[tokio::test]
    async fn known_session_reuses_engine() {
        let store = store(SessionPolicy::default());
        let id = open(&store).await;

        let out = store.dispatch(Some(&id), &request(1, "tools/list"), None).await;
        assert!(out.created.is_none());
        assert!(out.reply.is_ok());
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&id).unwrap().id(), id);
    }

    #[tokio::test]
    async fn unknown_session_rejected() {
        let store = store(SessionPolicy::default());
        let out = store
            .dispatch(Some("no-such-session"), &request(1, "tools/list"), None)
            .await;
        let err = out.reply.unwrap_err();
        assert_eq!(err.code(), NO_SESSION_CODE);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn failed_initialize_creates_nothing() {
        let store = store(SessionPolicy::default());
        let mut req = request(0, "initialize");
        req.params = Some(json!({"protocolVersion": 42}));
        let out = store.dispatch(None, &req, None).await;
        assert!(out.reply.is_err());
        assert!(out.created.is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn notify_touches_known_session() {
        let store = store(SessionPolicy::default());
        let id = open(&store).await;
        let session = store.get(&id).unwrap();
        let before = session.last_activity();

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(store.notify(Some(&id)));
        assert!(session.last_activity() > before);

        assert!(!store.notify(Some("unknown")));
        assert!(!store.notify(None));
    }

    #[tokio::test]
    async fn idle_sessions_are_evicted() {
        let store = store(SessionPolicy {
            idle_timeout: Duration::from_millis(20),
            max_sessions: 16,
        });
        let stale = open(&store).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        let fresh = open(&store).await;

        assert_eq!(store.evict_idle(), 1);
        assert!(store.get(&stale).is_none());
        assert!(store.get(&fresh).is_some());
    }

    #[tokio::test]
    async fn capacity_evicts_least_recently_active() {
        let store = store(SessionPolicy {
            idle_timeout: Duration::from_secs(600),
            max_sessions: 2,
        });
        let first = open(&store).await;
        tokio::time::sleep(Duration::from_millis(2)).await;
        let second = open(&store).await;
        tokio::time::sleep(Duration::from_millis(2)).await;
        store.notify(Some(&first));

        let third = open(&store).await;
        assert_eq!(store.len(), 2);
        assert!(store.get(&first).is_some());
        assert!(store.get(&second).is_none());
        assert!(store.get(&third).is_some());
    }
}
