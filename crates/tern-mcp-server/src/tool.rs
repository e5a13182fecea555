//! MCP tool trait and the function-backed implementation every frontend
//! lowers into

use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use tern_mcp_protocol::schema::ObjectSchema;
use tern_mcp_protocol::tools::Tool;
use tern_mcp_protocol::McpResult;

use crate::context::RequestContext;
use crate::normalize::ToolOutput;

/// High-level trait for implementing MCP tools.
///
/// The dispatcher validates arguments against `input_schema` before `call`
/// runs; handlers receive arguments that already passed validation, with
/// defaults filled in.
#[async_trait]
pub trait McpTool: Send + Sync {
    /// Canonical tool name, unique across tools (snake_case preferred)
    fn name(&self) -> &str;

    fn description(&self) -> Option<&str> {
        None
    }

    fn input_schema(&self) -> &ObjectSchema;

    /// Per-tool timeout override; the server default applies when None
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// Execute with validated arguments
    async fn call(&self, args: Value, ctx: RequestContext) -> McpResult<ToolOutput>;

    /// The protocol descriptor advertised by `tools/list`
    fn to_tool(&self) -> Tool {
        let mut tool = Tool::new(self.name(), self.input_schema().clone());
        if let Some(description) = self.description() {
            tool = tool.with_description(description);
        }
        tool
    }
}

/// Boxed async tool handler
pub type ToolHandlerFn =
    Box<dyn Fn(Value, RequestContext) -> BoxFuture<'static, McpResult<ToolOutput>> + Send + Sync>;

/// A tool backed by a closure, the common product of all frontends
pub struct FnTool {
    name: String,
    description: Option<String>,
    input_schema: ObjectSchema,
    timeout: Option<Duration>,
    handler: ToolHandlerFn,
}

impl std::fmt::Debug for FnTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl FnTool {
    pub fn new<F, Fut>(name: impl Into<String>, input_schema: ObjectSchema, handler: F) -> Self
    where
        F: Fn(Value, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = McpResult<ToolOutput>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: None,
            input_schema,
            timeout: None,
            handler: Box::new(move |args, ctx| Box::pin(handler(args, ctx))),
        }
    }

    /// Construct from an already-boxed handler (frontend lowering path)
    pub fn from_boxed(
        name: impl Into<String>,
        input_schema: ObjectSchema,
        handler: ToolHandlerFn,
    ) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema,
            timeout: None,
            handler,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl McpTool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn input_schema(&self) -> &ObjectSchema {
        &self.input_schema
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn call(&self, args: Value, ctx: RequestContext) -> McpResult<ToolOutput> {
        (self.handler)(args, ctx).await
    }
}
