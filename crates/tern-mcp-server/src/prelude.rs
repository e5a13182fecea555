//! Convenience re-exports for server authors

pub use crate::builder::ServerBuilder;
pub use crate::context::RequestContext;
pub use crate::normalize::ToolOutput;
pub use crate::prompt::{FnPrompt, McpPrompt, TemplatePrompt};
pub use crate::resource::{FnResource, McpResource, StaticResource};
pub use crate::sandbox::{SandboxPolicy, SandboxRequest};
pub use crate::server::{McpServer, ServerState, TransportKind};
pub use crate::tool::{FnTool, McpTool};
pub use crate::ui::{UiEntry, UiSource, UiSourceValue};
pub use crate::{FrameworkError, Result};

pub use tern_mcp_protocol::prompts::{PromptArgument, PromptMessage};
pub use tern_mcp_protocol::schema::{JsonSchema, ObjectSchema};
pub use tern_mcp_protocol::{McpError, McpResult};
