//! The server instance and its lifecycle
//!
//! State machine: `Constructed` -> `Configured` (after any registration) ->
//! `Running` (after start) -> `Stopped`. Registration is rejected while
//! running - the registry is append-only before start and immutable after.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use tern_mcp_json_rpc_server::JsonRpcDispatcher;
use tern_mcp_protocol::McpError;
use tern_mcp_protocol::initialize::{CapabilitySnapshot, Implementation};

use crate::bridge::ClientBridge;
use crate::dispatcher::{KernelDispatcher, ServerSettings};
use crate::prompt::McpPrompt;
use crate::registry::Registry;
use crate::resource::McpResource;
use crate::session::SessionManager;
use crate::tool::McpTool;
use crate::ui::UiEntry;
use crate::uires::{UiCompiler, UiCompilerConfig};
use crate::{FrameworkError, Result, ServerBuilder};

/// Server lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Constructed,
    Configured,
    Running,
    Stopped,
}

/// Which transport `start` should bind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Stdio,
    Http { port: Option<u16> },
}

/// Read-only server description
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    pub title: Option<String>,
    pub state: ServerState,
    pub capabilities: CapabilitySnapshot,
}

/// Registry and session counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerStats {
    pub tools: usize,
    pub prompts: usize,
    pub resources: usize,
    pub uis: usize,
    pub sessions: usize,
}

/// HTTP binding options carried from the builder
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub bind_address: std::net::SocketAddr,
    pub mcp_path: String,
    pub enable_cors: bool,
    pub enable_sse: bool,
}

/// An MCP server instance: one registry, one session map, one lifecycle
pub struct McpServer {
    info: Implementation,
    instructions: Option<String>,
    registry: Arc<RwLock<Registry>>,
    sessions: Arc<SessionManager>,
    bridge: Arc<ClientBridge>,
    settings: Arc<ServerSettings>,
    ui_compiler: Arc<UiCompiler>,
    state: Mutex<ServerState>,
    shutdown: CancellationToken,
    #[cfg(feature = "http")]
    http: HttpOptions,
}

impl std::fmt::Debug for McpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpServer").finish_non_exhaustive()
    }
}

impl McpServer {
    /// Create a builder
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        info: Implementation,
        instructions: Option<String>,
        registry: Registry,
        base_path: Option<PathBuf>,
        default_timeout: Duration,
        session_ttl: Duration,
        expose_tools_to_sandbox: bool,
        ui_config: UiCompilerConfig,
        #[cfg(feature = "http")] http: HttpOptions,
    ) -> Self {
        let (tools, prompts, resources, uis) = registry.counts();
        let configured = tools + prompts + resources + uis > 0;

        let base_path = base_path
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let settings = Arc::new(ServerSettings {
            base_path: base_path.clone(),
            default_timeout,
            expose_tools_to_sandbox,
        });
        let ui_compiler = Arc::new(UiCompiler::new(base_path, ui_config));

        Self {
            info,
            instructions,
            registry: Arc::new(RwLock::new(registry)),
            sessions: Arc::new(SessionManager::new(session_ttl)),
            bridge: Arc::new(ClientBridge::new()),
            settings,
            ui_compiler,
            state: Mutex::new(if configured {
                ServerState::Configured
            } else {
                ServerState::Constructed
            }),
            shutdown: CancellationToken::new(),
            #[cfg(feature = "http")]
            http,
        }
    }

    pub fn state(&self) -> ServerState {
        *self.state.lock().unwrap()
    }

    pub fn info(&self) -> ServerInfo {
        ServerInfo {
            name: self.info.name.clone(),
            version: self.info.version.clone(),
            title: self.info.title.clone(),
            state: self.state(),
            capabilities: self.registry.read().unwrap().snapshot(),
        }
    }

    pub fn stats(&self) -> ServerStats {
        let (tools, prompts, resources, uis) = self.registry.read().unwrap().counts();
        ServerStats {
            tools,
            prompts,
            resources,
            uis,
            sessions: self.sessions.count(),
        }
    }

    fn ensure_mutable(&self) -> Result<()> {
        match self.state() {
            ServerState::Running => Err(FrameworkError::config(
                "registration is not permitted while the server is running",
            )),
            ServerState::Stopped => Err(FrameworkError::config(
                "registration is not permitted after the server has stopped",
            )),
            _ => Ok(()),
        }
    }

    fn mark_configured(&self) {
        let mut state = self.state.lock().unwrap();
        if *state == ServerState::Constructed {
            *state = ServerState::Configured;
        }
    }

    /// Register a tool (rejected once running)
    pub fn add_tool<T: McpTool + 'static>(&self, tool: T) -> Result<()> {
        self.ensure_mutable()?;
        self.registry.write().unwrap().insert_tool(Arc::new(tool))?;
        self.mark_configured();
        Ok(())
    }

    /// Register a prompt (rejected once running)
    pub fn add_prompt<P: McpPrompt + 'static>(&self, prompt: P) -> Result<()> {
        self.ensure_mutable()?;
        self.registry
            .write()
            .unwrap()
            .insert_prompt(Arc::new(prompt))?;
        self.mark_configured();
        Ok(())
    }

    /// Register a resource (rejected once running)
    pub fn add_resource<R: McpResource + 'static>(&self, resource: R) -> Result<()> {
        self.ensure_mutable()?;
        self.registry
            .write()
            .unwrap()
            .insert_resource(Arc::new(resource))?;
        self.mark_configured();
        Ok(())
    }

    /// Register a UI resource (rejected once running)
    pub fn add_ui(&self, entry: UiEntry) -> Result<()> {
        self.ensure_mutable()?;
        self.registry.write().unwrap().insert_ui(entry)?;
        self.mark_configured();
        Ok(())
    }

    /// Cross-validate the registry and transition to `Running`.
    ///
    /// Registration-time errors (UI whitelists naming missing tools) are
    /// fatal here, before any transport binds.
    fn mark_running(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match *state {
            ServerState::Running => {
                return Err(FrameworkError::config("server is already running"));
            }
            ServerState::Stopped => {
                return Err(FrameworkError::config("server has already stopped"));
            }
            _ => {}
        }
        self.registry.read().unwrap().validate()?;
        *state = ServerState::Running;
        info!(name = %self.info.name, version = %self.info.version, "server starting");
        Ok(())
    }

    /// Stop the server. Idempotent; a no-op when already stopped.
    pub fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        if *state == ServerState::Stopped {
            return;
        }
        *state = ServerState::Stopped;
        self.shutdown.cancel();
        info!(name = %self.info.name, "server stopped");
    }

    /// The kernel dispatcher wired into a JSON-RPC method router
    pub fn rpc_dispatcher(&self) -> Arc<JsonRpcDispatcher<McpError>> {
        let kernel = KernelDispatcher::new(
            self.info.clone(),
            self.instructions.clone(),
            self.registry.clone(),
            self.sessions.clone(),
            self.bridge.clone(),
            self.settings.clone(),
            self.ui_compiler.clone(),
        );
        let mut dispatcher = JsonRpcDispatcher::new();
        dispatcher.register(kernel);
        Arc::new(dispatcher)
    }

    pub fn sessions(&self) -> Arc<SessionManager> {
        self.sessions.clone()
    }

    /// Push `notifications/resources/updated` to every session subscribed
    /// to the URI. Returns how many sessions were notified.
    pub fn notify_resource_updated(&self, uri: &str) -> usize {
        let notification = tern_mcp_protocol::notifications::resource_updated(uri);
        let mut delivered = 0;
        for session in self.sessions.subscribers(uri) {
            if session.enqueue(tern_mcp_json_rpc_server::JsonRpcMessage::Notification(
                notification.clone(),
            )) {
                delivered += 1;
            }
        }
        delivered
    }

    pub(crate) fn bridge(&self) -> Arc<ClientBridge> {
        self.bridge.clone()
    }

    pub(crate) fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Start the chosen transport and serve until shutdown
    pub async fn start(&self, transport: TransportKind) -> Result<()> {
        match transport {
            TransportKind::Stdio => self.run_stdio().await,
            TransportKind::Http { port } => self.run_http(port).await,
        }
    }

    /// Serve over stdio until EOF or `stop`
    pub async fn run_stdio(&self) -> Result<()> {
        self.mark_running()?;
        let result = crate::stdio::run_lines(
            tokio::io::stdin(),
            tokio::io::stdout(),
            self.rpc_dispatcher(),
            self.sessions.clone(),
            self.bridge.clone(),
            self.shutdown.clone(),
        )
        .await;
        self.stop();
        result
    }

    /// Serve over streamable HTTP until `stop`
    #[cfg(feature = "http")]
    pub async fn run_http(&self, port: Option<u16>) -> Result<()> {
        self.mark_running()?;

        let mut bind_address = self.http.bind_address;
        if let Some(port) = port {
            bind_address.set_port(port);
        }
        let config = tern_http_mcp_server::ServerConfig {
            bind_address,
            mcp_path: self.http.mcp_path.clone(),
            enable_cors: self.http.enable_cors,
            enable_sse: self.http.enable_sse,
            sweep_interval: Duration::from_secs(60),
            ..Default::default()
        };

        let service = Arc::new(crate::http::KernelService::new(
            self.rpc_dispatcher(),
            self.sessions.clone(),
            self.bridge.clone(),
        ));
        let server = tern_http_mcp_server::HttpMcpServer::new(config, service);

        let shutdown = self.shutdown.clone();
        let result = tokio::select! {
            served = server.run() => served.map_err(FrameworkError::from),
            _ = shutdown.cancelled() => Ok(()),
        };
        self.stop();
        result
    }

    /// Without the "http" feature, HTTP transport reports the missing
    /// dependency instead of binding.
    #[cfg(not(feature = "http"))]
    pub async fn run_http(&self, _port: Option<u16>) -> Result<()> {
        Err(FrameworkError::Mcp(McpError::MissingDependency {
            feature: "http".to_string(),
            hint: "rebuild tern-mcp-server with the 'http' feature to use the HTTP transport"
                .to_string(),
        }))
    }
}
