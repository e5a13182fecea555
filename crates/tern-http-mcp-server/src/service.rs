//! The seam between the HTTP transport and the server kernel

use async_trait::async_trait;
use tokio::sync::mpsc;

use tern_mcp_json_rpc_server::JsonRpcMessage;
use tern_mcp_protocol::McpResult;

/// The result of dispatching one request body
#[derive(Debug, Default)]
pub struct BodyOutcome {
    /// Responses to return in the HTTP reply, in request order
    pub replies: Vec<JsonRpcMessage>,
    /// Whether the body was a batch (array framing on the reply)
    pub batch: bool,
    /// The body failed JSON-RPC parsing; reply with 400
    pub parse_failed: bool,
}

impl BodyOutcome {
    /// Notifications-only bodies produce no replies at all
    pub fn is_empty(&self) -> bool {
        self.replies.is_empty()
    }
}

/// What the kernel provides to the HTTP transport
#[async_trait]
pub trait McpService: Send + Sync + 'static {
    /// Resolve the session for a request: absent header allocates, known
    /// header touches, unknown header errors. Returns (id, newly_created).
    fn resolve_session(&self, supplied: Option<&str>) -> McpResult<(String, bool)>;

    /// Dispatch one raw request body within the session
    async fn handle_body(&self, session_id: &str, body: &str) -> BodyOutcome;

    /// Hand out the session's server-initiated message stream (one consumer)
    fn take_event_stream(
        &self,
        session_id: &str,
    ) -> Option<mpsc::UnboundedReceiver<JsonRpcMessage>>;

    /// Explicitly terminate a session
    fn end_session(&self, session_id: &str) -> bool;

    /// Cancel the session's in-flight calls (client disconnect)
    fn cancel_session(&self, session_id: &str);

    /// Sweep idle sessions; invoked on the transport's cleanup interval
    fn sweep_idle(&self) -> Vec<String>;
}
