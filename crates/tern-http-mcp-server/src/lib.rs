//! # HTTP MCP Server
//!
//! Streamable HTTP transport for tern-mcp: `POST /mcp` carries client to
//! server JSON-RPC (single messages or batches), an optional SSE stream on
//! the same path delivers server-initiated messages, and the
//! `Mcp-Session-Id` header binds requests to sessions. CORS is permissive
//! by default for local development.
//!
//! The transport is decoupled from the kernel through [`McpService`]: the
//! kernel implements session resolution, body dispatch, and event-stream
//! handout; this crate owns routing, headers, status codes, SSE framing,
//! and the idle-session sweep.

pub mod cors;
pub mod server;
pub mod service;
pub mod sse;

pub use cors::apply_cors_headers;
pub use server::{HttpMcpServer, ServerConfig};
pub use service::{BodyOutcome, McpService};
pub use sse::format_sse_data;

/// The session header exchanged with clients
pub const SESSION_HEADER: &str = "Mcp-Session-Id";

/// Result type for HTTP MCP operations
pub type Result<T> = std::result::Result<T, HttpMcpError>;

/// HTTP transport errors
#[derive(Debug, thiserror::Error)]
pub enum HttpMcpError {
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("MCP protocol error: {0}")]
    Mcp(#[from] tern_mcp_protocol::McpError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}
