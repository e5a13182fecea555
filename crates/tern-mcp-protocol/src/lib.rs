//! # Model Context Protocol (MCP) - 2025-06-18 Types
//!
//! Wire types, schema IR, and validation for the tern-mcp framework. This
//! crate defines everything the kernel speaks on the wire: initialization,
//! tools, prompts, resources, UI resources, completions, roots, sampling,
//! elicitation, and notifications, plus the schema intermediate
//! representation shared by every authoring frontend.
//!
//! The schema IR doubles as the validator: `JsonSchema::validate` walks a
//! value against the IR and reports the first offending field path and the
//! constraint it violated. Same IR, same verdict - there is no separate
//! compiled validator to drift out of sync.

pub mod completion;
pub mod content;
pub mod elicitation;
pub mod initialize;
pub mod notifications;
pub mod prompts;
pub mod resources;
pub mod roots;
pub mod sampling;
pub mod schema;
pub mod tools;
pub mod ui;
pub mod version;

pub use content::{ContentBlock, EmbeddedResource, ResourceContents};
pub use initialize::{
    CapabilitySnapshot, ClientCapabilities, Implementation, InitializeRequest, InitializeResult,
    ServerCapabilities,
};
pub use prompts::{
    GetPromptRequest, GetPromptResult, ListPromptsResult, Prompt, PromptArgument, PromptMessage,
    Role,
};
pub use resources::{
    ListResourcesResult, ReadResourceRequest, ReadResourceResult, Resource, SubscribeRequest,
    UnsubscribeRequest,
};
pub use schema::{JsonSchema, ObjectSchema, SchemaViolation};
pub use tools::{CallToolRequest, CallToolResult, ListToolsResult, Tool};
pub use ui::{UiResource, UiSize, UiSourceMode};
pub use version::McpVersion;

// JSON-RPC foundation
pub use tern_mcp_json_rpc_server::{
    JsonRpcError, JsonRpcErrorObject, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, RequestId,
};

/// The MCP protocol version implemented by this crate
pub const MCP_VERSION: &str = "2025-06-18";

/// Common result type for MCP operations
pub type McpResult<T> = Result<T, McpError>;

/// MCP-level errors: the kinds in the framework error taxonomy that travel
/// to the caller. Configuration errors are fatal at start; validation errors
/// map to invalid-params; execution and timeout errors become tool-error
/// content rather than transport errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum McpError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Prompt not found: {0}")]
    PromptNotFound(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Validation failed at '{path}': {constraint}")]
    SchemaViolation { path: String, constraint: String },

    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    #[error("Execution timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Content too large: {size} bytes exceeds the {limit} byte limit")]
    ContentTooLarge { size: u64, limit: u64 },

    #[error("Path escapes the server base path: {path}")]
    PathEscape { path: String },

    #[error("Invalid base64 payload: {0}")]
    InvalidBase64(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Missing optional dependency '{feature}': {hint}")]
    MissingDependency { feature: String, hint: String },

    #[error("No client handler registered for {0}")]
    NoClientHandler(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl McpError {
    pub fn invalid_params(message: impl Into<String>) -> Self {
        McpError::InvalidParameters(message.into())
    }

    pub fn missing_param(name: impl Into<String>) -> Self {
        McpError::MissingParameter(name.into())
    }

    pub fn tool_execution(message: impl Into<String>) -> Self {
        McpError::ToolExecution(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        McpError::Configuration(message.into())
    }

    /// Whether this error maps to JSON-RPC invalid-params (-32602)
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            McpError::InvalidParameters(_)
                | McpError::MissingParameter(_)
                | McpError::SchemaViolation { .. }
        )
    }
}

impl From<std::io::Error> for McpError {
    fn from(err: std::io::Error) -> Self {
        McpError::Io(err.to_string())
    }
}

impl From<SchemaViolation> for McpError {
    fn from(violation: SchemaViolation) -> Self {
        McpError::SchemaViolation {
            path: violation.path,
            constraint: violation.constraint,
        }
    }
}

impl tern_mcp_json_rpc_server::RpcConvert for McpError {
    fn to_error_object(&self) -> JsonRpcErrorObject {
        match self {
            err if err.is_validation() => JsonRpcErrorObject::invalid_params(err.to_string()),
            McpError::ToolNotFound(_)
            | McpError::PromptNotFound(_)
            | McpError::ResourceNotFound(_) => {
                JsonRpcErrorObject::server_error(-32001, self.to_string(), None)
            }
            McpError::SessionNotFound(_) => {
                JsonRpcErrorObject::server_error(-32002, self.to_string(), None)
            }
            McpError::MissingDependency { .. } => {
                JsonRpcErrorObject::server_error(-32003, self.to_string(), None)
            }
            other => JsonRpcErrorObject::internal_error(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_mcp_json_rpc_server::RpcConvert;

    #[test]
    fn test_validation_errors_map_to_invalid_params() {
        let err = McpError::missing_param("location");
        assert!(err.is_validation());
        assert_eq!(err.to_error_object().code, -32602);
    }

    #[test]
    fn test_not_found_maps_to_server_error() {
        let err = McpError::ToolNotFound("nope".to_string());
        assert_eq!(err.to_error_object().code, -32001);
    }

    #[test]
    fn test_timeout_message_shape() {
        let err = McpError::Timeout { ms: 5000 };
        assert_eq!(err.to_string(), "Execution timed out after 5000ms");
    }
}
