//! # MCP Server Kernel
//!
//! The unified runtime behind every tern-mcp authoring frontend. Frontends
//! (programmatic builder, functional config, manifest collector, interface
//! parser) all lower into the same in-memory model: a [`Registry`] of tools,
//! prompts, resources, and UI resources served over stdio or streamable HTTP.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tern_mcp_server::prelude::*;
//! use tern_mcp_protocol::schema::{JsonSchema, ObjectSchema};
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let server = McpServer::builder()
//!         .name("weather")
//!         .version("1.0.0")
//!         .tool(
//!             FnTool::new(
//!                 "get_temperature",
//!                 ObjectSchema::new().property("location", JsonSchema::string(), true),
//!                 |args, _ctx| async move {
//!                     let location = args["location"].as_str().unwrap_or_default();
//!                     Ok(ToolOutput::text(format!("21C in {location}")))
//!                 },
//!             )
//!             .with_description("Current temperature for a location"),
//!         )
//!         .build()?;
//!
//!     server.run_stdio().await?;
//!     Ok(())
//! }
//! ```

pub mod assets;
pub mod bridge;
pub mod builder;
pub mod context;
pub mod dispatcher;
pub mod normalize;
pub mod prelude;
pub mod prompt;
pub mod reconcile;
pub mod registry;
pub mod resource;
pub mod sandbox;
pub mod server;
pub mod session;
pub mod stdio;
pub mod template;
pub mod tool;
pub mod ui;
pub mod uires;

#[cfg(feature = "http")]
pub mod http;

pub use bridge::ClientBridge;
pub use builder::ServerBuilder;
pub use context::RequestContext;
pub use dispatcher::KernelDispatcher;
pub use normalize::ToolOutput;
pub use prompt::{FnPrompt, McpPrompt, TemplatePrompt};
pub use reconcile::{NameVariant, Reconciled, reconcile};
pub use registry::Registry;
pub use resource::{FnResource, McpResource, StaticResource};
pub use sandbox::{SandboxOutcome, SandboxPolicy, SandboxRequest};
pub use server::{McpServer, ServerInfo, ServerState, ServerStats, TransportKind};
pub use session::{Session, SessionManager};
pub use tool::{FnTool, McpTool};
pub use ui::{UiEntry, UiSource, UiSourceValue};

// Re-export foundational types
pub use tern_mcp_json_rpc_server::{JsonRpcDispatcher, JsonRpcHandler};
pub use tern_mcp_protocol::{McpError, McpResult};

/// Result type for framework operations
pub type Result<T> = std::result::Result<T, FrameworkError>;

/// Framework-level errors
#[derive(Debug, thiserror::Error)]
pub enum FrameworkError {
    #[error("JSON-RPC error: {0}")]
    JsonRpc(#[from] tern_mcp_json_rpc_server::JsonRpcError),

    #[error("MCP protocol error: {0}")]
    Mcp(#[from] tern_mcp_protocol::McpError),

    #[cfg(feature = "http")]
    #[error("HTTP transport error: {0}")]
    Http(#[from] tern_http_mcp_server::HttpMcpError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameworkError {
    pub fn config(message: impl Into<String>) -> Self {
        FrameworkError::Config(message.into())
    }
}

/// Initialize stderr logging with env-filter support.
///
/// Stdout must stay clean for the stdio transport, so all diagnostics go
/// to stderr. `RUST_LOG` controls the filter; setting `TERN_MCP_QUIET`
/// silences everything.
pub fn init_stderr_logging() {
    if std::env::var_os("TERN_MCP_QUIET").is_some() {
        return;
    }
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
