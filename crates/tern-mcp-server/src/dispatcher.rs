//! Request dispatch over the registry
//!
//! Implements the MCP method surface. Tool calls validate before the
//! handler runs, execute under their timeout with an abort signal, and wrap
//! handler failures into tool-error results (successful transport, failed
//! tool). Requests within one session are processed in arrival order;
//! sessions are independent of each other.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use tern_mcp_json_rpc_server::{JsonRpcHandler, RequestParams, SessionContext};
use tern_mcp_protocol::completion::{CompleteRequest, CompleteResult, Completion, CompletionReference};
use tern_mcp_protocol::initialize::{Implementation, InitializeResult};
use tern_mcp_protocol::prompts::{GetPromptRequest, GetPromptResult, ListPromptsResult};
use tern_mcp_protocol::resources::{
    ListResourcesResult, ReadResourceRequest, ReadResourceResult, SubscribeRequest,
    UnsubscribeRequest,
};
use tern_mcp_protocol::roots::ListRootsResult;
use tern_mcp_protocol::tools::{CallToolRequest, CallToolResult, ListToolsResult};
use tern_mcp_protocol::{McpError, McpResult};

use crate::bridge::ClientBridge;
use crate::context::{RequestContext, ToolCatalog, ToolInvoker};
use crate::normalize::normalize;
use crate::registry::Registry;
use crate::sandbox::TOOL_RUNNER_NAME;
use crate::session::SessionManager;
use crate::uires::UiCompiler;

/// Server-wide dispatch settings
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Base path for asset resolution and file-handle jailing
    pub base_path: std::path::PathBuf,
    /// Default tool timeout when the entry has no override
    pub default_timeout: Duration,
    /// Re-expose registered tools to sandboxed code
    pub expose_tools_to_sandbox: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            base_path: std::env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from(".")),
            default_timeout: Duration::from_secs(30),
            expose_tools_to_sandbox: false,
        }
    }
}

/// The kernel's JSON-RPC handler: every transport dispatches through this
pub struct KernelDispatcher {
    info: Implementation,
    instructions: Option<String>,
    registry: Arc<RwLock<Registry>>,
    sessions: Arc<SessionManager>,
    bridge: Arc<ClientBridge>,
    settings: Arc<ServerSettings>,
    ui_compiler: Arc<UiCompiler>,
}

impl KernelDispatcher {
    pub fn new(
        info: Implementation,
        instructions: Option<String>,
        registry: Arc<RwLock<Registry>>,
        sessions: Arc<SessionManager>,
        bridge: Arc<ClientBridge>,
        settings: Arc<ServerSettings>,
        ui_compiler: Arc<UiCompiler>,
    ) -> Self {
        Self {
            info,
            instructions,
            registry,
            sessions,
            bridge,
            settings,
            ui_compiler,
        }
    }

    /// The method table this dispatcher serves
    pub fn method_table() -> Vec<String> {
        [
            "initialize",
            "ping",
            "tools/list",
            "tools/call",
            "prompts/list",
            "prompts/get",
            "resources/list",
            "resources/read",
            "resources/subscribe",
            "resources/unsubscribe",
            "completions/complete",
            "roots/list",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    fn context_for(&self, session_id: &str) -> RequestContext {
        let mut ctx = RequestContext::new(session_id)
            .with_cancellation(CancellationToken::new())
            .with_bridge(self.bridge.clone());
        if let Some(session) = self.sessions.get(session_id) {
            // Chain onto the session token so a disconnect aborts the call
            ctx = ctx
                .with_cancellation(session.cancellation().child_token())
                .with_session(session);
        }
        if self.settings.expose_tools_to_sandbox {
            ctx = ctx.with_tool_catalog(self.tool_catalog(session_id));
        }
        ctx
    }

    fn tool_catalog(&self, session_id: &str) -> ToolCatalog {
        let names: Vec<String> = self
            .registry
            .read()
            .unwrap()
            .tool_names()
            .into_iter()
            .filter(|n| n != TOOL_RUNNER_NAME)
            .collect();
        ToolCatalog {
            names,
            invoker: make_tool_invoker(
                self.registry.clone(),
                self.settings.clone(),
                session_id.to_string(),
            ),
        }
    }

    async fn handle_initialize(&self) -> McpResult<Value> {
        let snapshot = self.registry.read().unwrap().snapshot();
        let mut result =
            InitializeResult::new(self.info.clone(), snapshot.to_capabilities());
        if let Some(instructions) = &self.instructions {
            result = result.with_instructions(instructions.clone());
        }
        to_value(result)
    }

    async fn handle_tools_list(&self) -> McpResult<Value> {
        let mut tools: Vec<_> = self
            .registry
            .read()
            .unwrap()
            .tools()
            .map(|t| t.to_tool())
            .collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        to_value(ListToolsResult::new(tools))
    }

    async fn handle_tools_call(&self, params: Value, ctx: RequestContext) -> McpResult<Value> {
        let request: CallToolRequest = from_params(params)?;
        let args = request.arguments.unwrap_or_else(|| json!({}));
        let result = self.dispatch_tool_call(&request.name, args, ctx).await?;
        to_value(result)
    }

    async fn dispatch_tool_call(
        &self,
        name: &str,
        args: Value,
        ctx: RequestContext,
    ) -> McpResult<CallToolResult> {
        let tool = self
            .registry
            .read()
            .unwrap()
            .tool(name)
            .ok_or_else(|| McpError::ToolNotFound(name.to_string()))?;

        // Invalid arguments never reach the handler
        let validated = tool.input_schema().validate(&args)?;

        let timeout = tool.timeout().unwrap_or(self.settings.default_timeout);
        let token = ctx.cancellation().clone();
        debug!(tool = name, ?timeout, "invoking tool");

        match tokio::time::timeout(timeout, tool.call(validated, ctx)).await {
            Ok(Ok(output)) => match normalize(output, &self.settings.base_path).await {
                Ok(content) => Ok(CallToolResult::success(content)),
                Err(err) => Ok(tool_error_result(&err)),
            },
            Ok(Err(err)) => Ok(tool_error_result(&err)),
            Err(_) => {
                token.cancel();
                Ok(CallToolResult::error(format!(
                    "Execution timed out after {}ms",
                    timeout.as_millis()
                )))
            }
        }
    }

    async fn handle_prompts_list(&self) -> McpResult<Value> {
        let mut prompts: Vec<_> = self
            .registry
            .read()
            .unwrap()
            .prompts()
            .map(|p| p.to_prompt())
            .collect();
        prompts.sort_by(|a, b| a.name.cmp(&b.name));
        to_value(ListPromptsResult::new(prompts))
    }

    async fn handle_prompts_get(&self, params: Value) -> McpResult<Value> {
        let request: GetPromptRequest = from_params(params)?;
        let prompt = self
            .registry
            .read()
            .unwrap()
            .prompt(&request.name)
            .ok_or_else(|| McpError::PromptNotFound(request.name.clone()))?;

        let args: HashMap<String, Value> = match request.arguments {
            Some(Value::Object(map)) => map.into_iter().collect(),
            Some(Value::Null) | None => HashMap::new(),
            Some(_) => {
                return Err(McpError::invalid_params("prompt arguments must be an object"));
            }
        };

        // Required-presence is checked for every prompt; dynamic prompts
        // get no per-argument schema validation beyond that.
        prompt.check_required(&args)?;
        let messages = prompt.render(args).await?;
        let mut result = GetPromptResult::new(messages);
        if let Some(description) = prompt.description() {
            result = result.with_description(description);
        }
        to_value(result)
    }

    async fn handle_resources_list(&self) -> McpResult<Value> {
        let mut resources: Vec<_> = {
            let registry = self.registry.read().unwrap();
            registry
                .resources()
                .map(|r| r.to_resource())
                .chain(registry.uis().map(|u| u.to_resource()))
                .collect()
        };
        resources.sort_by(|a, b| a.uri.cmp(&b.uri));
        to_value(ListResourcesResult::new(resources))
    }

    async fn handle_resources_read(&self, params: Value, ctx: RequestContext) -> McpResult<Value> {
        let request: ReadResourceRequest = from_params(params)?;

        let (resource, ui) = {
            let registry = self.registry.read().unwrap();
            (registry.resource(&request.uri), registry.ui(&request.uri))
        };

        if let Some(resource) = resource {
            let contents = resource.read(ctx).await?;
            return to_value(ReadResourceResult::new(contents));
        }
        if let Some(ui) = ui {
            let compiled = self.ui_compiler.compile(&ui, ctx).await?;
            return to_value(ReadResourceResult::new(vec![compiled.contents]));
        }
        Err(McpError::ResourceNotFound(request.uri))
    }

    async fn handle_subscribe(&self, params: Value, session_id: &str) -> McpResult<Value> {
        let request: SubscribeRequest = from_params(params)?;
        if !self.registry.read().unwrap().has_readable(&request.uri) {
            return Err(McpError::ResourceNotFound(request.uri));
        }
        let session = self
            .sessions
            .get(session_id)
            .ok_or_else(|| McpError::SessionNotFound(session_id.to_string()))?;
        session.subscribe(&request.uri);
        Ok(json!({}))
    }

    async fn handle_unsubscribe(&self, params: Value, session_id: &str) -> McpResult<Value> {
        let request: UnsubscribeRequest = from_params(params)?;
        let session = self
            .sessions
            .get(session_id)
            .ok_or_else(|| McpError::SessionNotFound(session_id.to_string()))?;
        session.unsubscribe(&request.uri);
        Ok(json!({}))
    }

    async fn handle_complete(&self, params: Value) -> McpResult<Value> {
        let request: CompleteRequest = from_params(params)?;
        let key = match &request.reference {
            CompletionReference::Prompt { name } => name.clone(),
            CompletionReference::Resource { uri } => uri.clone(),
        };
        let provider = self.registry.read().unwrap().completion(&key);
        let completion = match provider {
            Some(provider) => {
                provider(request.argument.name.clone(), request.argument.value.clone()).await?
            }
            None => Completion::empty(),
        };
        to_value(CompleteResult::new(completion))
    }

    async fn handle_roots_list(&self) -> McpResult<Value> {
        let roots = self.registry.read().unwrap().roots().to_vec();
        to_value(ListRootsResult::new(roots))
    }
}

#[async_trait]
impl JsonRpcHandler for KernelDispatcher {
    type Error = McpError;

    async fn handle(
        &self,
        method: &str,
        params: Option<RequestParams>,
        session: Option<SessionContext>,
    ) -> Result<Value, McpError> {
        let session_id = session
            .as_ref()
            .map(|s| s.session_id.clone())
            .unwrap_or_else(|| crate::session::STDIO_SESSION_ID.to_string());

        // Per-session FIFO: requests begin (and here, complete) in arrival
        // order; distinct sessions proceed independently.
        let session_handle = self.sessions.get(&session_id);
        let _fifo = match &session_handle {
            Some(session) => Some(session.serialize().await),
            None => None,
        };
        if let Some(session) = &session_handle {
            session.touch();
        }

        let params = params.map(|p| p.to_value()).unwrap_or(Value::Null);
        let ctx = self.context_for(&session_id);

        match method {
            "initialize" => self.handle_initialize().await,
            "ping" => Ok(json!({})),
            "tools/list" => self.handle_tools_list().await,
            "tools/call" => self.handle_tools_call(params, ctx).await,
            "prompts/list" => self.handle_prompts_list().await,
            "prompts/get" => self.handle_prompts_get(params).await,
            "resources/list" => self.handle_resources_list().await,
            "resources/read" => self.handle_resources_read(params, ctx).await,
            "resources/subscribe" => self.handle_subscribe(params, &session_id).await,
            "resources/unsubscribe" => self.handle_unsubscribe(params, &session_id).await,
            "completions/complete" => self.handle_complete(params).await,
            "roots/list" => self.handle_roots_list().await,
            other => Err(McpError::configuration(format!(
                "method '{}' is not served by this dispatcher",
                other
            ))),
        }
    }

    fn supported_methods(&self) -> Vec<String> {
        Self::method_table()
    }
}

/// Build the dispatch function handed to sandboxed code. Calls travel the
/// same validation path as client-originated `tools/call` requests; the
/// runner itself is excluded to prevent recursion.
pub(crate) fn make_tool_invoker(
    registry: Arc<RwLock<Registry>>,
    settings: Arc<ServerSettings>,
    session_id: String,
) -> ToolInvoker {
    Arc::new(move |name: String, args: Value| {
        let registry = registry.clone();
        let settings = settings.clone();
        let session_id = session_id.clone();
        Box::pin(async move {
            if name == TOOL_RUNNER_NAME {
                return Err(McpError::ToolNotFound(name));
            }
            let tool = registry
                .read()
                .unwrap()
                .tool(&name)
                .ok_or_else(|| McpError::ToolNotFound(name.clone()))?;
            let validated = tool.input_schema().validate(&args)?;
            let ctx = RequestContext::new(session_id);
            let timeout = tool.timeout().unwrap_or(settings.default_timeout);
            match tokio::time::timeout(timeout, tool.call(validated, ctx)).await {
                Ok(Ok(output)) => {
                    let content = normalize(output, &settings.base_path).await?;
                    Ok(CallToolResult::success(content))
                }
                Ok(Err(err)) => Ok(tool_error_result(&err)),
                Err(_) => Ok(CallToolResult::error(format!(
                    "Execution timed out after {}ms",
                    timeout.as_millis()
                ))),
            }
        })
    })
}

/// Wrap a handler failure into a tool-error result with a trimmed preview
fn tool_error_result(err: &McpError) -> CallToolResult {
    let message = err.to_string();
    let preview: Vec<&str> = message.lines().take(4).collect();
    CallToolResult::error(preview.join("\n"))
}

fn to_value<T: serde::Serialize>(value: T) -> McpResult<Value> {
    serde_json::to_value(value).map_err(|e| McpError::tool_execution(e.to_string()))
}

fn from_params<T: serde::de::DeserializeOwned>(params: Value) -> McpResult<T> {
    serde_json::from_value(params).map_err(|e| McpError::invalid_params(e.to_string()))
}
