//! The functional frontend: a config object lowered into registry calls
//!
//! [`McpConfig`] is fully deserializable (load it from JSON, TOML, or build
//! it in code); everything dynamic binds to a named handler in the
//! [`HandlerMap`] through the name reconciler. Missing bindings compose
//! into a single configuration error listing every miss.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use tern_mcp_protocol::prompts::PromptArgument;
use tern_mcp_protocol::schema::ObjectSchema;
use tern_mcp_protocol::ui::UiSize;
use tern_mcp_server::prompt::{FnPrompt, PromptHandlerFn, TemplatePrompt};
use tern_mcp_server::reconcile::{reconcile, to_camel_case};
use tern_mcp_server::resource::{FnResource, ResourceHandlerFn, StaticResource};
use tern_mcp_server::tool::{FnTool, ToolHandlerFn};
use tern_mcp_server::ui::{UiEntry, UiSource, UiSourceFn};
use tern_mcp_server::{McpServer, Result};

/// One tool entry in the config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub schema: ObjectSchema,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// One declared prompt argument
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptArgConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
}

/// One prompt entry. A literal template with no `dynamic` flag is static.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub arguments: Vec<PromptArgConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default)]
    pub dynamic: bool,
}

impl PromptConfig {
    /// Static iff a literal template is present and `dynamic` is unset
    pub fn is_static(&self) -> bool {
        self.template.is_some() && !self.dynamic
    }
}

/// One resource entry. Literal `data` with no `dynamic` flag is static.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub uri: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default)]
    pub dynamic: bool,
}

impl ResourceConfig {
    pub fn is_static(&self) -> bool {
        self.data.is_some() && !self.dynamic
    }
}

/// One UI entry; a missing literal `source` binds a callable by URI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    pub uri: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<UiSize>,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// The `defineMCP`-style config object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "basePath", skip_serializing_if = "Option::is_none")]
    pub base_path: Option<PathBuf>,
    #[serde(default)]
    pub tools: Vec<ToolConfig>,
    #[serde(default)]
    pub prompts: Vec<PromptConfig>,
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
    #[serde(default)]
    pub uis: Vec<UiConfig>,
}

/// Named handlers backing the config's dynamic entries
#[derive(Default)]
pub struct HandlerMap {
    tools: HashMap<String, ToolHandlerFn>,
    prompts: HashMap<String, PromptHandlerFn>,
    resources: HashMap<String, ResourceHandlerFn>,
    ui_sources: HashMap<String, UiSourceFn>,
}

impl HandlerMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tool<F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value, tern_mcp_server::RequestContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<
                Output = tern_mcp_protocol::McpResult<tern_mcp_server::ToolOutput>,
            > + Send
            + 'static,
    {
        self.tools
            .insert(name.into(), Box::new(move |args, ctx| Box::pin(f(args, ctx))));
        self
    }

    pub fn prompt<F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(HashMap<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<
                Output = tern_mcp_protocol::McpResult<
                    Vec<tern_mcp_protocol::prompts::PromptMessage>,
                >,
            > + Send
            + 'static,
    {
        self.prompts
            .insert(name.into(), Box::new(move |args| Box::pin(f(args))));
        self
    }

    pub fn resource<F, Fut>(mut self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn(tern_mcp_server::RequestContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = tern_mcp_protocol::McpResult<Value>> + Send + 'static,
    {
        self.resources
            .insert(key.into(), Box::new(move |ctx| Box::pin(f(ctx))));
        self
    }

    pub fn ui_source<F, Fut>(mut self, uri: impl Into<String>, f: F) -> Self
    where
        F: Fn(tern_mcp_server::RequestContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<
                Output = tern_mcp_protocol::McpResult<tern_mcp_server::UiSourceValue>,
            > + Send
            + 'static,
    {
        self.ui_sources.insert(
            uri.into(),
            std::sync::Arc::new(move |ctx| Box::pin(f(ctx))),
        );
        self
    }

    fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    fn prompt_names(&self) -> Vec<String> {
        self.prompts.keys().cloned().collect()
    }

    fn resource_names(&self) -> Vec<String> {
        self.resources.keys().cloned().collect()
    }
}

/// Translate a config object and its handlers into a built server.
///
/// Every tool needs a handler; dynamic prompts bind the camelCase of their
/// name; dynamic resources bind their URI. All missing bindings are
/// reported together.
pub fn load_config(config: McpConfig, mut handlers: HandlerMap) -> Result<McpServer> {
    let mut builder = McpServer::builder()
        .name(&config.name)
        .version(&config.version);
    if let Some(description) = &config.description {
        builder = builder.instructions(description.clone());
    }
    if let Some(base_path) = &config.base_path {
        builder = builder.base_path(base_path.clone());
    }

    let mut missing: Vec<String> = Vec::new();

    for tool in config.tools {
        let bound = match reconcile(&tool.name, &handlers.tool_names()) {
            Ok(bound) => bound,
            Err(err) => {
                missing.push(err.to_string());
                continue;
            }
        };
        let handler = handlers.tools.remove(&bound.member).expect("reconciled");
        let mut entry = FnTool::from_boxed(&tool.name, tool.schema, handler);
        if let Some(description) = tool.description {
            entry = entry.with_description(description);
        }
        if let Some(timeout_ms) = tool.timeout_ms {
            entry = entry.with_timeout(std::time::Duration::from_millis(timeout_ms));
        }
        builder = builder.tool(entry);
        debug!(tool = %tool.name, member = %bound.member, "config tool lowered");
    }

    for prompt in config.prompts {
        let arguments: Vec<PromptArgument> = prompt
            .arguments
            .iter()
            .map(|a| {
                let mut argument = PromptArgument::new(&a.name);
                if let Some(description) = &a.description {
                    argument = argument.with_description(description.clone());
                }
                if a.required {
                    argument = argument.required();
                }
                argument
            })
            .collect();

        if prompt.is_static() {
            let template = prompt.template.expect("static prompt has a template");
            let mut entry = TemplatePrompt::new(&prompt.name, template).with_arguments(arguments);
            if let Some(description) = prompt.description {
                entry = entry.with_description(description);
            }
            builder = builder.prompt(entry);
        } else {
            // Dynamic prompts bind the camelCase of the declared name
            let binding = to_camel_case(&prompt.name);
            let bound = match reconcile(&binding, &handlers.prompt_names()) {
                Ok(bound) => bound,
                Err(err) => {
                    missing.push(err.to_string());
                    continue;
                }
            };
            let handler = handlers.prompts.remove(&bound.member).expect("reconciled");
            let mut entry = FnPrompt::from_boxed(&prompt.name, handler).with_arguments(arguments);
            if let Some(description) = prompt.description {
                entry = entry.with_description(description);
            }
            builder = builder.prompt(entry);
        }
    }

    for resource in config.resources {
        if resource.is_static() {
            let data = resource.data.expect("static resource has data");
            let mut entry = StaticResource::new(&resource.uri, &resource.name, data);
            if let Some(description) = resource.description {
                entry = entry.with_description(description);
            }
            if let Some(mime_type) = resource.mime_type {
                entry = entry.with_mime_type(mime_type);
            }
            builder = builder.resource(entry);
        } else {
            // Dynamic resources bind their URI as the member name
            let bound = match reconcile(&resource.uri, &handlers.resource_names()) {
                Ok(bound) => bound,
                Err(err) => {
                    missing.push(err.to_string());
                    continue;
                }
            };
            let handler = handlers.resources.remove(&bound.member).expect("reconciled");
            let mut entry = FnResource::from_boxed(&resource.uri, &resource.name, handler);
            if let Some(description) = resource.description {
                entry = entry.with_description(description);
            }
            if let Some(mime_type) = resource.mime_type {
                entry = entry.with_mime_type(mime_type);
            }
            builder = builder.resource(entry);
        }
    }

    for ui in config.uis {
        let source = match (&ui.source, handlers.ui_sources.remove(&ui.uri)) {
            (Some(literal), None) => UiSource::literal(literal.clone()),
            (None, Some(callable)) => UiSource::Callable(callable),
            (Some(_), Some(_)) => {
                missing.push(format!(
                    "UI '{}' declares both a literal source and a source handler",
                    ui.uri
                ));
                continue;
            }
            (None, None) => {
                missing.push(format!(
                    "UI '{}' has no source and no source handler registered under its URI",
                    ui.uri
                ));
                continue;
            }
        };
        let entry = match UiEntry::new(&ui.uri, &ui.name, source) {
            Ok(entry) => entry,
            Err(err) => {
                missing.push(err.to_string());
                continue;
            }
        };
        let mut entry = entry.with_tools(ui.tools);
        if let Some(description) = ui.description {
            entry = entry.with_description(description);
        }
        if let Some(size) = ui.size {
            entry = entry.with_size(size);
        }
        if let Some(mime_type) = ui.mime_type {
            entry = entry.with_mime_override(mime_type);
        }
        builder = builder.ui(entry);
    }

    if !missing.is_empty() {
        return Err(tern_mcp_server::FrameworkError::Config(format!(
            "config binding errors:\n{}",
            missing.join("\n")
        )));
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tern_mcp_protocol::schema::JsonSchema;
    use tern_mcp_server::ToolOutput;

    fn sample_config() -> McpConfig {
        serde_json::from_value(json!({
            "name": "weather",
            "version": "1.0.0",
            "tools": [
                {
                    "name": "get_temperature",
                    "description": "Current temperature",
                    "schema": {
                        "type": "object",
                        "properties": {"location": {"type": "string"}},
                        "required": ["location"]
                    }
                }
            ],
            "prompts": [
                {
                    "name": "weather_report",
                    "template": "Report for {location}.",
                    "arguments": [{"name": "location", "required": true}]
                },
                {
                    "name": "fresh_take",
                    "dynamic": true
                }
            ],
            "resources": [
                {"uri": "config://app", "name": "App config", "data": {"retries": 3}},
                {"uri": "stats://search", "name": "Search stats", "dynamic": true}
            ],
            "uis": [
                {"uri": "ui://panel", "name": "Panel", "source": "<div>panel</div>"}
            ]
        }))
        .unwrap()
    }

    fn sample_handlers() -> HandlerMap {
        HandlerMap::new()
            .tool("get_temperature", |_args, _ctx| async {
                Ok(ToolOutput::text("21"))
            })
            // camelCase binding for the dynamic prompt declared as fresh_take
            .prompt("freshTake", |_args| async {
                Ok(vec![tern_mcp_protocol::prompts::PromptMessage::user("hi")])
            })
            .resource("stats://search", |_ctx| async { Ok(json!({"n": 1})) })
    }

    #[test]
    fn test_config_lowering() {
        let server = load_config(sample_config(), sample_handlers()).unwrap();
        let stats = server.stats();
        assert_eq!(stats.tools, 1);
        assert_eq!(stats.prompts, 2);
        assert_eq!(stats.resources, 2);
        assert_eq!(stats.uis, 1);
    }

    #[test]
    fn test_missing_bindings_reported_together() {
        let err = load_config(sample_config(), HandlerMap::new()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("get_temperature"));
        assert!(message.contains("freshTake"));
        assert!(message.contains("stats://search"));
    }

    #[test]
    fn test_classification_rules() {
        let config = sample_config();
        assert!(config.prompts[0].is_static());
        assert!(!config.prompts[1].is_static());
        assert!(config.resources[0].is_static());
        assert!(!config.resources[1].is_static());
    }

    #[test]
    fn test_schema_accepts_declared_literals() {
        let config = sample_config();
        let schema = &config.tools[0].schema;
        assert!(schema.validate(&json!({"location": "Paris"})).is_ok());
        assert!(schema.validate(&json!({})).is_err());
        let _ = JsonSchema::string();
    }
}
