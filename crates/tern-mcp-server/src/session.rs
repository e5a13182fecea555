//! Session management
//!
//! Sessions are memory-resident and owned by the single server instance.
//! HTTP clients get a cryptographically random identifier on first contact;
//! the stdio transport uses exactly one implicit session named `stdio`,
//! which never expires. Idle sessions are swept on a fixed interval,
//! releasing their subscription records and queued server-initiated
//! messages.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::{Duration, SystemTime};

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use tern_mcp_json_rpc_server::JsonRpcMessage;
use tern_mcp_protocol::{McpError, McpResult};

/// Identifier of the single implicit stdio session
pub const STDIO_SESSION_ID: &str = "stdio";

/// Default idle TTL: 30 minutes
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

/// One logical client conversation
pub struct Session {
    id: String,
    created_at: SystemTime,
    persistent: bool,
    last_seen: Mutex<SystemTime>,
    subscriptions: Mutex<HashSet<String>>,
    outbound_tx: mpsc::UnboundedSender<JsonRpcMessage>,
    outbound_rx: Mutex<Option<mpsc::UnboundedReceiver<JsonRpcMessage>>>,
    stream_attached: AtomicBool,
    /// Serializes dispatch within the session (arrival order)
    fifo: tokio::sync::Mutex<()>,
    /// Fires when the session ends or its client disconnects
    cancel: CancellationToken,
}

impl Session {
    fn new(id: String, persistent: bool) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let now = SystemTime::now();
        Self {
            id,
            created_at: now,
            persistent,
            last_seen: Mutex::new(now),
            subscriptions: Mutex::new(HashSet::new()),
            outbound_tx,
            outbound_rx: Mutex::new(Some(outbound_rx)),
            stream_attached: AtomicBool::new(false),
            fifo: tokio::sync::Mutex::new(()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Record activity, postponing expiry
    pub fn touch(&self) {
        *self.last_seen.lock().unwrap() = SystemTime::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_seen
            .lock()
            .unwrap()
            .elapsed()
            .unwrap_or(Duration::ZERO)
    }

    /// Record a (session, uri) subscription pair
    pub fn subscribe(&self, uri: &str) -> bool {
        self.subscriptions.lock().unwrap().insert(uri.to_string())
    }

    pub fn unsubscribe(&self, uri: &str) -> bool {
        self.subscriptions.lock().unwrap().remove(uri)
    }

    pub fn is_subscribed(&self, uri: &str) -> bool {
        self.subscriptions.lock().unwrap().contains(uri)
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().unwrap().iter().cloned().collect()
    }

    /// Queue a server-initiated message for delivery, in emit order
    pub fn enqueue(&self, message: JsonRpcMessage) -> bool {
        self.outbound_tx.send(message).is_ok()
    }

    /// Take the outbound stream for delivery. Each session has one
    /// consumer; a second take returns None until the stream is released
    /// by dropping and the session recreated.
    pub fn take_stream(&self) -> Option<mpsc::UnboundedReceiver<JsonRpcMessage>> {
        let taken = self.outbound_rx.lock().unwrap().take();
        if taken.is_some() {
            self.stream_attached.store(true, Ordering::SeqCst);
        }
        taken
    }

    /// Whether a delivery stream is (or was) attached
    pub fn has_stream(&self) -> bool {
        self.stream_attached.load(Ordering::SeqCst)
    }

    /// Session-level abort signal; fires on expiry, explicit termination,
    /// or client disconnect
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Acquire the per-session dispatch lock
    pub async fn serialize(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.fifo.lock().await
    }

    fn end(&self) {
        self.cancel.cancel();
        self.subscriptions.lock().unwrap().clear();
        // Dropping the receiver releases any queued messages
        self.outbound_rx.lock().unwrap().take();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("persistent", &self.persistent)
            .field("subscriptions", &self.subscriptions.lock().unwrap().len())
            .finish()
    }
}

/// Owns the session map; all mutations are synchronous within the event loop
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Allocate a new session with a random identifier
    pub fn create(&self) -> Arc<Session> {
        let id = Uuid::new_v4().to_string();
        let session = Arc::new(Session::new(id.clone(), false));
        self.sessions
            .write()
            .unwrap()
            .insert(id.clone(), session.clone());
        debug!(session_id = %id, "session created");
        session
    }

    /// Register the implicit stdio session (idempotent)
    pub fn create_stdio(&self) -> Arc<Session> {
        let mut sessions = self.sessions.write().unwrap();
        sessions
            .entry(STDIO_SESSION_ID.to_string())
            .or_insert_with(|| Arc::new(Session::new(STDIO_SESSION_ID.to_string(), true)))
            .clone()
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().unwrap().get(id).cloned()
    }

    /// Resolve a transport-supplied session header: absent allocates, known
    /// touches, unknown fails.
    pub fn resolve(&self, supplied: Option<&str>) -> McpResult<(Arc<Session>, bool)> {
        match supplied {
            None => Ok((self.create(), true)),
            Some(id) => match self.get(id) {
                Some(session) => {
                    session.touch();
                    Ok((session, false))
                }
                None => Err(McpError::SessionNotFound(id.to_string())),
            },
        }
    }

    /// Terminate and remove a session
    pub fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.write().unwrap().remove(id);
        if let Some(session) = removed {
            session.end();
            debug!(session_id = %id, "session removed");
            true
        } else {
            false
        }
    }

    /// Sweep sessions idle past the TTL, returning the expired ids
    pub fn expire_idle(&self) -> Vec<String> {
        let expired: Vec<String> = {
            let sessions = self.sessions.read().unwrap();
            sessions
                .values()
                .filter(|s| !s.persistent && s.idle_for() > self.ttl)
                .map(|s| s.id().to_string())
                .collect()
        };
        for id in &expired {
            self.remove(id);
        }
        if !expired.is_empty() {
            info!(count = expired.len(), "expired idle sessions");
        }
        expired
    }

    pub fn count(&self) -> usize {
        self.sessions.read().unwrap().len()
    }

    /// Cancel in-flight work for one session (client disconnect)
    pub fn cancel_inflight(&self, id: &str) {
        if let Some(session) = self.get(id) {
            session.cancellation().cancel();
        }
    }

    /// Sessions holding a subscription on the given URI
    pub fn subscribers(&self, uri: &str) -> Vec<Arc<Session>> {
        self.sessions
            .read()
            .unwrap()
            .values()
            .filter(|s| s.is_subscribed(uri))
            .cloned()
            .collect()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_lifecycle() {
        let manager = SessionManager::default();
        assert_eq!(manager.count(), 0);

        let session = manager.create();
        assert_eq!(manager.count(), 1);
        assert!(manager.get(session.id()).is_some());

        assert!(manager.remove(session.id()));
        assert_eq!(manager.count(), 0);
        assert!(session.cancellation().is_cancelled());
    }

    #[test]
    fn test_resolve_allocates_and_touches() {
        let manager = SessionManager::default();
        let (session, fresh) = manager.resolve(None).unwrap();
        assert!(fresh);

        let (same, fresh) = manager.resolve(Some(session.id())).unwrap();
        assert!(!fresh);
        assert_eq!(same.id(), session.id());

        let err = manager.resolve(Some("unknown")).unwrap_err();
        assert!(matches!(err, McpError::SessionNotFound(_)));
    }

    #[test]
    fn test_subscriptions() {
        let manager = SessionManager::default();
        let session = manager.create();
        assert!(session.subscribe("stats://search"));
        assert!(!session.subscribe("stats://search"));
        assert!(session.is_subscribed("stats://search"));
        assert!(session.unsubscribe("stats://search"));
        assert!(!session.is_subscribed("stats://search"));
    }

    #[test]
    fn test_expiry_skips_stdio() {
        let manager = SessionManager::new(Duration::ZERO);
        manager.create_stdio();
        let ephemeral = manager.create();
        std::thread::sleep(Duration::from_millis(5));

        let expired = manager.expire_idle();
        assert_eq!(expired, vec![ephemeral.id().to_string()]);
        assert!(manager.get(STDIO_SESSION_ID).is_some());
    }

    #[tokio::test]
    async fn test_outbound_queue_preserves_order() {
        let manager = SessionManager::default();
        let session = manager.create();
        let mut rx = session.take_stream().unwrap();
        assert!(session.take_stream().is_none());

        for i in 0..3 {
            session.enqueue(JsonRpcMessage::success(
                tern_mcp_json_rpc_server::RequestId::Number(i),
                serde_json::Value::Null,
            ));
        }
        for i in 0..3 {
            let msg = rx.recv().await.unwrap();
            assert_eq!(
                msg.id(),
                Some(&tern_mcp_json_rpc_server::RequestId::Number(i))
            );
        }
    }
}
