//! Per-request execution context handed to handlers

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use tern_mcp_protocol::elicitation::{ElicitRequest, ElicitResult};
use tern_mcp_protocol::sampling::{CreateMessageRequest, CreateMessageResult};
use tern_mcp_protocol::tools::CallToolResult;
use tern_mcp_protocol::{McpError, McpResult};

use crate::bridge::ClientBridge;
use crate::session::Session;

/// Dispatch function for re-entering the kernel from sandboxed code.
///
/// Invocations travel the same validation path as client-originated
/// `tools/call` requests.
pub type ToolInvoker = Arc<
    dyn Fn(String, Value) -> futures::future::BoxFuture<'static, McpResult<CallToolResult>>
        + Send
        + Sync,
>;

/// The host tool surface re-exposed to sandboxed code
#[derive(Clone)]
pub struct ToolCatalog {
    pub names: Vec<String>,
    pub invoker: ToolInvoker,
}

/// Execution context for a single dispatched request.
///
/// Carries the session identifier, an abort signal that fires at timeout or
/// client disconnect, and the channel for bidirectional client requests.
#[derive(Clone)]
pub struct RequestContext {
    session_id: String,
    request_id: Option<String>,
    cancellation: CancellationToken,
    session: Option<Arc<Session>>,
    bridge: Option<Arc<ClientBridge>>,
    tool_catalog: Option<ToolCatalog>,
}

impl RequestContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            request_id: None,
            cancellation: CancellationToken::new(),
            session: None,
            bridge: None,
            tool_catalog: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub(crate) fn with_session(mut self, session: Arc<Session>) -> Self {
        self.session = Some(session);
        self
    }

    pub(crate) fn with_bridge(mut self, bridge: Arc<ClientBridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    pub(crate) fn with_tool_catalog(mut self, catalog: ToolCatalog) -> Self {
        self.tool_catalog = Some(catalog);
        self
    }

    /// The session this request belongs to
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The originating request id, when known
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// The abort signal for this call. Fires at timeout or disconnect;
    /// handlers may observe it to cancel cooperatively.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Host tools available to sandboxed code, when introspection is enabled
    pub fn tool_catalog(&self) -> Option<&ToolCatalog> {
        self.tool_catalog.as_ref()
    }

    /// Ask the connected client to collect structured user input.
    ///
    /// Fails with [`McpError::NoClientHandler`] when no client channel is
    /// attached to the session.
    pub async fn elicit(&self, request: ElicitRequest) -> McpResult<ElicitResult> {
        let (bridge, session) = self.bidirectional("elicitation/create")?;
        let value = bridge
            .request(
                &session,
                "elicitation/create",
                serde_json::to_value(&request)
                    .map_err(|e| McpError::tool_execution(e.to_string()))?,
            )
            .await?;
        serde_json::from_value(value).map_err(|e| {
            McpError::tool_execution(format!("malformed elicitation result: {}", e))
        })
    }

    /// Ask the connected client to run an LLM sampling request
    pub async fn sample(&self, request: CreateMessageRequest) -> McpResult<CreateMessageResult> {
        let (bridge, session) = self.bidirectional("sampling/createMessage")?;
        let value = bridge
            .request(
                &session,
                "sampling/createMessage",
                serde_json::to_value(&request)
                    .map_err(|e| McpError::tool_execution(e.to_string()))?,
            )
            .await?;
        serde_json::from_value(value)
            .map_err(|e| McpError::tool_execution(format!("malformed sampling result: {}", e)))
    }

    fn bidirectional(&self, method: &str) -> McpResult<(Arc<ClientBridge>, Arc<Session>)> {
        match (&self.bridge, &self.session) {
            (Some(bridge), Some(session)) => Ok((bridge.clone(), session.clone())),
            _ => Err(McpError::NoClientHandler(method.to_string())),
        }
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("session_id", &self.session_id)
            .field("request_id", &self.request_id)
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bidirectional_without_client_channel() {
        let ctx = RequestContext::new("stdio");
        let err = ctx
            .elicit(ElicitRequest::new(
                "email?",
                tern_mcp_protocol::schema::JsonSchema::object(),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::NoClientHandler(_)));
    }

    #[test]
    fn test_cancellation_propagates() {
        let token = CancellationToken::new();
        let ctx = RequestContext::new("s1").with_cancellation(token.clone());
        assert!(!ctx.is_cancelled());
        token.cancel();
        assert!(ctx.is_cancelled());
    }
}
