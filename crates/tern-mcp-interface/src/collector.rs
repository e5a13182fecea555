//! Manifest collection: the decorator-style frontend
//!
//! A constructed handler set attaches its metadata as a [`ServerManifest`]
//! and registers its methods in a [`MethodRegistry`]. Collection
//! enumerates explicitly tagged tools first, auto-registers the remaining
//! public methods as kebab-case tools, and merges runtime parameter
//! information (names, defaults) with types parsed from the same source
//! file - by positional index, with the parsed type winning on a name
//! match and the runtime supplying defaults.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use tern_mcp_protocol::schema::{JsonSchema, ObjectSchema};
use tern_mcp_protocol::{McpError, McpResult};
use tern_mcp_server::reconcile::{to_kebab_case, to_snake_case};
use tern_mcp_server::tool::{FnTool, ToolHandlerFn};

use crate::model::InterfaceModel;

/// Server metadata attached by the authoring class
#[derive(Debug, Clone)]
pub struct ServerManifest {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub port: Option<u16>,
}

impl ServerManifest {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: None,
            port: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }
}

/// Runtime-visible parameter information: name and optional default
#[derive(Debug, Clone)]
pub struct RuntimeParam {
    pub name: String,
    pub default: Option<Value>,
}

impl RuntimeParam {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// How a method was registered
enum MethodTag {
    /// Explicitly tagged as a tool, optionally overriding the name
    Tool { name: Option<String>, description: Option<String> },
    /// Untagged; public methods auto-register as kebab-case tools
    Untagged,
}

struct MethodEntry {
    method_name: String,
    tag: MethodTag,
    params: Vec<RuntimeParam>,
    handler: ToolHandlerFn,
}

/// Ordered registry of the class's methods
#[derive(Default)]
pub struct MethodRegistry {
    entries: Vec<MethodEntry>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a public method (auto-registered unless underscore-prefixed)
    pub fn method<F, Fut>(
        mut self,
        method_name: impl Into<String>,
        params: Vec<RuntimeParam>,
        handler: F,
    ) -> Self
    where
        F: Fn(Value, tern_mcp_server::RequestContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<
                Output = McpResult<tern_mcp_server::ToolOutput>,
            > + Send
            + 'static,
    {
        self.entries.push(MethodEntry {
            method_name: method_name.into(),
            tag: MethodTag::Untagged,
            params,
            handler: Box::new(move |args, ctx| Box::pin(handler(args, ctx))),
        });
        self
    }

    /// Register a method explicitly tagged as a tool
    pub fn tagged_tool<F, Fut>(
        mut self,
        method_name: impl Into<String>,
        tool_name: Option<String>,
        description: Option<String>,
        params: Vec<RuntimeParam>,
        handler: F,
    ) -> Self
    where
        F: Fn(Value, tern_mcp_server::RequestContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<
                Output = McpResult<tern_mcp_server::ToolOutput>,
            > + Send
            + 'static,
    {
        self.entries.push(MethodEntry {
            method_name: method_name.into(),
            tag: MethodTag::Tool {
                name: tool_name,
                description,
            },
            params,
            handler: Box::new(move |args, ctx| Box::pin(handler(args, ctx))),
        });
        self
    }

    pub fn method_names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.method_name.clone()).collect()
    }
}

/// The collected result: server info plus fully-built tools
#[derive(Debug)]
pub struct CollectedServer {
    pub manifest: ServerManifest,
    pub tools: Vec<FnTool>,
}

/// Collect a manifest and method registry into built tools.
///
/// `parsed` carries type information from the AST parse of the same source
/// file; without it, parameters fall back to `Any` schemas with
/// runtime-supplied defaults.
pub fn collect(
    manifest: ServerManifest,
    registry: MethodRegistry,
    parsed: Option<&InterfaceModel>,
) -> McpResult<CollectedServer> {
    let mut tools = Vec::new();

    for entry in registry.entries {
        let (tool_name, description, auto) = match &entry.tag {
            MethodTag::Tool { name, description } => (
                name.clone()
                    .unwrap_or_else(|| to_snake_case(&entry.method_name)),
                description.clone(),
                false,
            ),
            MethodTag::Untagged => {
                // Private convention: underscore prefix and constructors
                // stay unregistered
                if entry.method_name.starts_with('_') || entry.method_name == "new" {
                    continue;
                }
                (to_kebab_case(&entry.method_name), None, true)
            }
        };

        let decl = parsed.and_then(|model| {
            model.tools.iter().find(|t| {
                t.name == tool_name
                    || to_kebab_case(&t.name) == tool_name
                    || to_snake_case(&t.name) == to_snake_case(&entry.method_name)
            })
        });

        let schema = merge_schema(&entry.params, decl);
        let description = description.or_else(|| decl.and_then(|d| d.description.clone()));

        debug!(
            method = %entry.method_name,
            tool = %tool_name,
            auto,
            parsed = decl.is_some(),
            "collected method"
        );

        let mut tool = FnTool::from_boxed(tool_name, schema, entry.handler);
        if let Some(description) = description {
            tool = tool.with_description(description);
        }
        tools.push(tool);
    }

    if tools.is_empty() {
        return Err(McpError::configuration(format!(
            "server '{}' collected no tools; register at least one public method",
            manifest.name
        )));
    }

    Ok(CollectedServer { manifest, tools })
}

/// Merge runtime parameters with parsed types by positional index
fn merge_schema(
    runtime: &[RuntimeParam],
    decl: Option<&crate::model::ToolDecl>,
) -> ObjectSchema {
    let mut schema = ObjectSchema::new();
    let mut defaults: HashMap<String, Value> = HashMap::new();

    for (index, param) in runtime.iter().enumerate() {
        let parsed = decl.and_then(|d| d.params.get(index));
        // The parsed type wins when names agree; runtime keeps the name
        let (leaf, parsed_required) = match parsed {
            Some(p) if to_snake_case(&p.name) == to_snake_case(&param.name) => {
                (p.schema.clone(), p.required)
            }
            _ => (JsonSchema::any(), true),
        };
        let required = parsed_required && param.default.is_none();
        if let Some(default) = &param.default {
            defaults.insert(param.name.clone(), default.clone());
        }
        schema = schema.property(&param.name, leaf, required);
    }

    if !defaults.is_empty() {
        schema = schema.with_defaults(defaults);
    }
    schema
}
