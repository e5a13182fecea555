//! Server builder
//!
//! The programmatic entry point every other frontend lowers into.
//! Registration problems are collected during configuration and reported
//! together from `build`, so a config with three bad entries names all
//! three instead of failing one at a time.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use tern_mcp_protocol::initialize::Implementation;
use tern_mcp_protocol::roots::Root;
use tern_mcp_protocol::{McpError, McpResult};

use crate::normalize::ToolOutput;
use crate::prompt::McpPrompt;
use crate::registry::{CompletionFn, Registry};
use crate::resource::McpResource;
use crate::sandbox::{self, SandboxPolicy, SandboxRequest, TOOL_RUNNER_NAME, tool_runner_schema};
use crate::server::McpServer;
use crate::session::DEFAULT_SESSION_TTL;
use crate::tool::{FnTool, McpTool};
use crate::ui::UiEntry;
use crate::uires::UiCompilerConfig;
use crate::{FrameworkError, Result};

/// Builder for MCP servers
pub struct ServerBuilder {
    name: String,
    version: String,
    title: Option<String>,
    instructions: Option<String>,
    base_path: Option<PathBuf>,
    default_timeout: Duration,
    session_ttl: Duration,
    registry: Registry,
    sandbox: Option<SandboxPolicy>,
    ui_config: UiCompilerConfig,
    validation_errors: Vec<String>,

    #[cfg(feature = "http")]
    bind_address: std::net::SocketAddr,
    #[cfg(feature = "http")]
    mcp_path: String,
    #[cfg(feature = "http")]
    enable_cors: bool,
    #[cfg(feature = "http")]
    enable_sse: bool,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            name: "tern-mcp-server".to_string(),
            version: "1.0.0".to_string(),
            title: None,
            instructions: None,
            base_path: None,
            default_timeout: Duration::from_secs(30),
            session_ttl: DEFAULT_SESSION_TTL,
            registry: Registry::new(),
            sandbox: None,
            ui_config: UiCompilerConfig::default(),
            validation_errors: Vec::new(),
            #[cfg(feature = "http")]
            bind_address: "127.0.0.1:8000".parse().unwrap(),
            #[cfg(feature = "http")]
            mcp_path: "/mcp".to_string(),
            #[cfg(feature = "http")]
            enable_cors: true,
            #[cfg(feature = "http")]
            enable_sse: true,
        }
    }

    /// Set the server name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the server version
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Set the display title
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set instructions surfaced to clients at initialize
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Base path for asset resolution; file reads outside it are rejected
    pub fn base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Default tool timeout (entries may override per tool)
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Idle session TTL for the HTTP transport
    pub fn session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Register a tool
    pub fn tool<T: McpTool + 'static>(mut self, tool: T) -> Self {
        if let Err(err) = self.registry.insert_tool(Arc::new(tool)) {
            self.validation_errors.push(err.to_string());
        }
        self
    }

    /// Register multiple tools
    pub fn tools<T: McpTool + 'static, I: IntoIterator<Item = T>>(mut self, tools: I) -> Self {
        for tool in tools {
            self = self.tool(tool);
        }
        self
    }

    /// Register a prompt
    pub fn prompt<P: McpPrompt + 'static>(mut self, prompt: P) -> Self {
        if let Err(err) = self.registry.insert_prompt(Arc::new(prompt)) {
            self.validation_errors.push(err.to_string());
        }
        self
    }

    /// Register a resource
    pub fn resource<R: McpResource + 'static>(mut self, resource: R) -> Self {
        if let Err(err) = self.registry.insert_resource(Arc::new(resource)) {
            self.validation_errors.push(err.to_string());
        }
        self
    }

    /// Register a UI resource
    pub fn ui(mut self, entry: UiEntry) -> Self {
        if let Err(err) = self.registry.insert_ui(entry) {
            self.validation_errors.push(err.to_string());
        }
        self
    }

    /// Register a UI resource from a fallible constructor
    pub fn try_ui(mut self, entry: McpResult<UiEntry>) -> Self {
        match entry {
            Ok(entry) => self.ui(entry),
            Err(err) => {
                self.validation_errors.push(err.to_string());
                self
            }
        }
    }

    /// Add a configured root directory
    pub fn root(mut self, root: Root) -> Self {
        self.registry.add_root(root);
        self
    }

    /// Attach a completion provider to a prompt name or resource URI
    pub fn completion_provider<F, Fut>(mut self, key: impl Into<String>, provider: F) -> Self
    where
        F: Fn(String, String) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = McpResult<tern_mcp_protocol::completion::Completion>>
            + Send
            + 'static,
    {
        let provider: CompletionFn = Arc::new(move |arg, value| Box::pin(provider(arg, value)));
        self.registry.insert_completion(key, provider);
        self
    }

    /// Enable the code execution sandbox, auto-registering `tool_runner`
    pub fn enable_code_execution(mut self, policy: SandboxPolicy) -> Self {
        self.sandbox = Some(policy);
        self
    }

    /// Configure UI component compilation (CDN externals, inline limits)
    pub fn ui_compiler_config(mut self, config: UiCompilerConfig) -> Self {
        self.ui_config = config;
        self
    }

    /// Set the HTTP bind address (requires the "http" feature)
    #[cfg(feature = "http")]
    pub fn bind_address(mut self, addr: std::net::SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    /// Set the MCP endpoint path (requires the "http" feature)
    #[cfg(feature = "http")]
    pub fn mcp_path(mut self, path: impl Into<String>) -> Self {
        self.mcp_path = path.into();
        self
    }

    /// Enable or disable CORS (requires the "http" feature)
    #[cfg(feature = "http")]
    pub fn cors(mut self, enable: bool) -> Self {
        self.enable_cors = enable;
        self
    }

    /// Enable or disable the GET SSE stream (requires the "http" feature)
    #[cfg(feature = "http")]
    pub fn sse(mut self, enable: bool) -> Self {
        self.enable_sse = enable;
        self
    }

    /// Build the server
    pub fn build(mut self) -> Result<McpServer> {
        if self.name.is_empty() {
            return Err(FrameworkError::config("server name cannot be empty"));
        }
        if self.version.is_empty() {
            return Err(FrameworkError::config("server version cannot be empty"));
        }

        let expose_tools = self.sandbox.as_ref().is_some_and(|p| p.expose_tools);
        if let Some(policy) = self.sandbox.take() {
            let runner = make_tool_runner(policy);
            if let Err(err) = self.registry.insert_tool(Arc::new(runner)) {
                self.validation_errors.push(err.to_string());
            }
        }

        if !self.validation_errors.is_empty() {
            return Err(FrameworkError::Config(format!(
                "registration errors:\n{}",
                self.validation_errors.join("\n")
            )));
        }

        let mut implementation = Implementation::new(&self.name, &self.version);
        if let Some(title) = self.title {
            implementation = implementation.with_title(title);
        }

        let snapshot = self.registry.snapshot();
        info!(
            tools = snapshot.tools,
            prompts = snapshot.prompts,
            resources = snapshot.resources,
            ui = snapshot.ui,
            "configured server capabilities"
        );

        Ok(McpServer::new(
            implementation,
            self.instructions,
            self.registry,
            self.base_path,
            self.default_timeout,
            self.session_ttl,
            expose_tools,
            self.ui_config,
            #[cfg(feature = "http")]
            crate::server::HttpOptions {
                bind_address: self.bind_address,
                mcp_path: self.mcp_path,
                enable_cors: self.enable_cors,
                enable_sse: self.enable_sse,
            },
        ))
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The auto-registered sandbox meta-tool
fn make_tool_runner(policy: SandboxPolicy) -> FnTool {
    let timeout = policy.timeout + Duration::from_secs(5);
    FnTool::new(TOOL_RUNNER_NAME, tool_runner_schema(), move |args, ctx| {
        let policy = policy.clone();
        async move {
            let request: SandboxRequest = serde_json::from_value(args)
                .map_err(|e| McpError::invalid_params(e.to_string()))?;
            let outcome = sandbox::execute(request, &policy, ctx.tool_catalog()).await;
            let value = serde_json::to_value(outcome)
                .map_err(|e| McpError::tool_execution(e.to_string()))?;
            Ok(ToolOutput::json(value))
        }
    })
    .with_description("Execute TypeScript or JavaScript in an isolated sandbox")
    .with_timeout(timeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::ServerState;
    use tern_mcp_protocol::schema::ObjectSchema;

    fn noop_tool(name: &str) -> FnTool {
        FnTool::new(name, ObjectSchema::new(), |_a, _c| async {
            Ok(ToolOutput::text("ok"))
        })
    }

    #[test]
    fn test_builder_defaults() {
        let builder = ServerBuilder::new();
        assert_eq!(builder.name, "tern-mcp-server");
        assert_eq!(builder.version, "1.0.0");
        assert_eq!(builder.default_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_empty_name_rejected() {
        let result = ServerBuilder::new().name("").build();
        assert!(matches!(result, Err(FrameworkError::Config(_))));
    }

    #[test]
    fn test_duplicate_errors_reported_together() {
        let result = ServerBuilder::new()
            .tool(noop_tool("a"))
            .tool(noop_tool("a"))
            .tool(noop_tool("b"))
            .tool(noop_tool("b"))
            .build();
        let Err(FrameworkError::Config(message)) = result else {
            panic!("expected config error");
        };
        assert!(message.contains("'a'"));
        assert!(message.contains("'b'"));
    }

    #[test]
    fn test_build_configured_state() {
        let server = ServerBuilder::new()
            .name("weather")
            .version("1.0.0")
            .tool(noop_tool("get_temperature"))
            .build()
            .unwrap();
        assert_eq!(server.state(), ServerState::Configured);
        assert_eq!(server.info().name, "weather");
    }

    #[test]
    fn test_code_execution_registers_runner() {
        let server = ServerBuilder::new()
            .name("runner")
            .enable_code_execution(SandboxPolicy::default())
            .build()
            .unwrap();
        let stats = server.stats();
        assert_eq!(stats.tools, 1);
        assert!(server.info().capabilities.tools);
    }
}
