//! Kernel-side implementation of the HTTP transport seam
//!
//! The HTTP crate owns routing, headers, and SSE framing; this module owns
//! everything session- and dispatch-shaped: body parsing, per-item routing
//! (requests, notifications, client replies), and the idle sweep.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;

use tern_http_mcp_server::{BodyOutcome, McpService};
use tern_mcp_json_rpc_server::{
    IncomingItem, JsonRpcDispatcher, JsonRpcMessage, SessionContext, parse_message,
};
use tern_mcp_protocol::{McpError, McpResult};

use crate::bridge::ClientBridge;
use crate::session::SessionManager;

/// Bridges the kernel dispatcher and session manager into the transport
pub struct KernelService {
    dispatcher: Arc<JsonRpcDispatcher<McpError>>,
    sessions: Arc<SessionManager>,
    bridge: Arc<ClientBridge>,
}

impl KernelService {
    pub fn new(
        dispatcher: Arc<JsonRpcDispatcher<McpError>>,
        sessions: Arc<SessionManager>,
        bridge: Arc<ClientBridge>,
    ) -> Self {
        Self {
            dispatcher,
            sessions,
            bridge,
        }
    }
}

#[async_trait]
impl McpService for KernelService {
    fn resolve_session(&self, supplied: Option<&str>) -> McpResult<(String, bool)> {
        let (session, fresh) = self.sessions.resolve(supplied)?;
        Ok((session.id().to_string(), fresh))
    }

    async fn handle_body(&self, session_id: &str, body: &str) -> BodyOutcome {
        let parsed = match parse_message(body) {
            Ok(parsed) => parsed,
            Err(err) => {
                return BodyOutcome {
                    replies: vec![JsonRpcMessage::Error(err)],
                    batch: false,
                    parse_failed: true,
                };
            }
        };

        let batch = parsed.is_batch();
        let mut replies = Vec::new();
        for item in parsed.into_items() {
            match item {
                IncomingItem::Request(request) => {
                    let response = self
                        .dispatcher
                        .dispatch(request, Some(SessionContext::new(session_id)))
                        .await;
                    replies.push(response);
                }
                IncomingItem::Notification(notification) => {
                    if let Err(err) = self
                        .dispatcher
                        .dispatch_notification(
                            &notification.method,
                            notification.params,
                            Some(SessionContext::new(session_id)),
                        )
                        .await
                    {
                        warn!("notification handler failed: {}", err);
                    }
                }
                IncomingItem::Reply(reply) => {
                    self.bridge.complete(reply);
                }
            }
        }

        BodyOutcome {
            replies,
            batch,
            parse_failed: false,
        }
    }

    fn take_event_stream(
        &self,
        session_id: &str,
    ) -> Option<mpsc::UnboundedReceiver<JsonRpcMessage>> {
        self.sessions.get(session_id)?.take_stream()
    }

    fn end_session(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id)
    }

    fn cancel_session(&self, session_id: &str) {
        self.sessions.cancel_inflight(session_id);
    }

    fn sweep_idle(&self) -> Vec<String> {
        self.sessions.expire_idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{KernelDispatcher, ServerSettings};
    use crate::registry::Registry;
    use crate::uires::UiCompiler;
    use std::sync::RwLock;
    use tern_mcp_protocol::initialize::Implementation;

    fn service() -> KernelService {
        let sessions = Arc::new(SessionManager::default());
        let settings = Arc::new(ServerSettings::default());
        let kernel = KernelDispatcher::new(
            Implementation::new("http-test", "0.0.0"),
            None,
            Arc::new(RwLock::new(Registry::new())),
            sessions.clone(),
            Arc::new(ClientBridge::new()),
            settings.clone(),
            Arc::new(UiCompiler::new(settings.base_path.clone(), Default::default())),
        );
        let mut dispatcher = JsonRpcDispatcher::new();
        dispatcher.register(kernel);
        KernelService::new(Arc::new(dispatcher), sessions, Arc::new(ClientBridge::new()))
    }

    #[tokio::test]
    async fn test_session_allocation_and_dispatch() {
        let service = service();
        let (session_id, fresh) = service.resolve_session(None).unwrap();
        assert!(fresh);

        let outcome = service
            .handle_body(
                &session_id,
                r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#,
            )
            .await;
        assert!(!outcome.parse_failed);
        assert_eq!(outcome.replies.len(), 1);
        assert!(!outcome.batch);
    }

    #[tokio::test]
    async fn test_malformed_body_flags_parse_failure() {
        let service = service();
        let (session_id, _) = service.resolve_session(None).unwrap();
        let outcome = service.handle_body(&session_id, "{ nope").await;
        assert!(outcome.parse_failed);
        assert!(outcome.replies[0].is_error());
    }

    #[tokio::test]
    async fn test_batch_framing() {
        let service = service();
        let (session_id, _) = service.resolve_session(None).unwrap();
        let outcome = service
            .handle_body(
                &session_id,
                r#"[{"jsonrpc":"2.0","id":1,"method":"ping"},{"jsonrpc":"2.0","id":2,"method":"ping"}]"#,
            )
            .await;
        assert!(outcome.batch);
        assert_eq!(outcome.replies.len(), 2);
    }

    #[tokio::test]
    async fn test_notifications_produce_no_replies() {
        let service = service();
        let (session_id, _) = service.resolve_session(None).unwrap();
        let outcome = service
            .handle_body(
                &session_id,
                r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            )
            .await;
        assert!(outcome.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_session_rejected() {
        let service = service();
        let err = service.resolve_session(Some("missing")).unwrap_err();
        assert!(matches!(err, McpError::SessionNotFound(_)));
    }
}
