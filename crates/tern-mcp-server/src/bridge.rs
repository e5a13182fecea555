//! Bidirectional request bridge
//!
//! Handlers can ask the connected client for input (elicitation) or for an
//! LLM completion (sampling). Each outgoing request gets a server-scoped id
//! and a oneshot slot in the pending map; the transport completes the slot
//! when the client's reply arrives. Correlation is by request id, so replies
//! may arrive on any request of the same session.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::warn;

use tern_mcp_json_rpc_server::{
    ClientReply, JsonRpcMessage, JsonRpcRequest, RequestId, RequestParams,
};
use tern_mcp_protocol::{McpError, McpResult};

use crate::session::Session;

/// Pending-request registry for server-initiated calls
pub struct ClientBridge {
    pending: Mutex<HashMap<String, oneshot::Sender<ClientReply>>>,
    counter: AtomicU64,
}

impl ClientBridge {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            counter: AtomicU64::new(1),
        }
    }

    /// Send a request to the session's client and await the correlated reply
    pub async fn request(
        &self,
        session: &Session,
        method: &str,
        params: Value,
    ) -> McpResult<Value> {
        let id = format!("srv-{}", self.counter.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(id.clone(), tx);

        let request = JsonRpcRequest::new(RequestId::String(id.clone()), method)
            .with_params(params_from_value(params));

        if !session.enqueue(JsonRpcMessage::Request(request)) {
            self.pending.lock().unwrap().remove(&id);
            return Err(McpError::NoClientHandler(method.to_string()));
        }

        let cancelled = session.cancellation().clone();
        tokio::select! {
            reply = rx => match reply {
                Ok(reply) => reply
                    .into_result()
                    .map_err(|err| McpError::tool_execution(format!(
                        "client rejected {}: {}", method, err.message
                    ))),
                Err(_) => Err(McpError::NoClientHandler(method.to_string())),
            },
            _ = cancelled.cancelled() => {
                self.pending.lock().unwrap().remove(&id);
                Err(McpError::tool_execution(format!(
                    "session ended while awaiting {} reply", method
                )))
            }
        }
    }

    /// Complete a pending request with the client's reply. Returns false for
    /// replies that correlate to nothing (already timed out, or bogus).
    pub fn complete(&self, reply: ClientReply) -> bool {
        let key = reply.id.as_key();
        match self.pending.lock().unwrap().remove(&key) {
            Some(slot) => slot.send(reply).is_ok(),
            None => {
                warn!(id = %key, "uncorrelated client reply dropped");
                false
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }
}

impl Default for ClientBridge {
    fn default() -> Self {
        Self::new()
    }
}

fn params_from_value(value: Value) -> RequestParams {
    match value {
        Value::Object(map) => RequestParams::Object(map.into_iter().collect()),
        Value::Array(items) => RequestParams::Array(items),
        other => RequestParams::Array(vec![other]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionManager;
    use serde_json::json;
    use tern_mcp_json_rpc_server::JsonRpcVersion;

    #[tokio::test]
    async fn test_request_reply_roundtrip() {
        let manager = SessionManager::default();
        let session = manager.create();
        let mut stream = session.take_stream().unwrap();
        let bridge = std::sync::Arc::new(ClientBridge::new());

        let bridge_clone = bridge.clone();
        let session_clone = session.clone();
        let task = tokio::spawn(async move {
            bridge_clone
                .request(&session_clone, "elicitation/create", json!({"message": "hi"}))
                .await
        });

        // The transport side sees the outgoing request and replies
        let JsonRpcMessage::Request(outgoing) = stream.recv().await.unwrap() else {
            panic!("expected outgoing request");
        };
        assert_eq!(outgoing.method, "elicitation/create");
        bridge.complete(ClientReply {
            version: JsonRpcVersion,
            id: outgoing.id,
            result: Some(json!({"action": "accept"})),
            error: None,
        });

        let result = task.await.unwrap().unwrap();
        assert_eq!(result["action"], "accept");
        assert_eq!(bridge.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_uncorrelated_reply_is_dropped() {
        let bridge = ClientBridge::new();
        let handled = bridge.complete(ClientReply {
            version: JsonRpcVersion,
            id: RequestId::String("srv-999".to_string()),
            result: Some(json!(null)),
            error: None,
        });
        assert!(!handled);
    }

    #[tokio::test]
    async fn test_session_end_aborts_pending() {
        let manager = SessionManager::default();
        let session = manager.create();
        let _stream = session.take_stream().unwrap();
        let bridge = ClientBridge::new();

        session.cancellation().cancel();
        let err = bridge
            .request(&session, "sampling/createMessage", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::ToolExecution(_)));
    }
}
