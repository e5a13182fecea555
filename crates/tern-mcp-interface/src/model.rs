//! The parsed interface model: declarations in IR form plus bindings

use serde_json::Value;

use tern_mcp_protocol::prompts::PromptArgument;
use tern_mcp_protocol::schema::{JsonSchema, ObjectSchema};
use tern_mcp_protocol::ui::UiSize;

/// Server descriptor declaration
#[derive(Debug, Clone)]
pub struct ServerDecl {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub port: Option<u16>,
}

/// One declared parameter, in source order
#[derive(Debug, Clone)]
pub struct ParamDecl {
    pub name: String,
    pub schema: JsonSchema,
    pub required: bool,
    pub description: Option<String>,
}

/// Tool descriptor declaration
#[derive(Debug, Clone)]
pub struct ToolDecl {
    pub name: String,
    pub description: Option<String>,
    pub params: Vec<ParamDecl>,
    pub result: Option<JsonSchema>,
}

impl ToolDecl {
    /// The params as a validating input schema
    pub fn input_schema(&self) -> ObjectSchema {
        let mut schema = ObjectSchema::new();
        for param in &self.params {
            schema = schema.property(&param.name, param.schema.clone(), param.required);
        }
        schema
    }
}

/// Prompt descriptor declaration
#[derive(Debug, Clone)]
pub struct PromptDecl {
    pub name: String,
    pub description: Option<String>,
    pub args: Vec<ParamDecl>,
    pub template: Option<String>,
    pub dynamic: bool,
}

impl PromptDecl {
    /// Static iff a literal template is present and no dynamic flag is set
    pub fn is_static(&self) -> bool {
        self.template.is_some() && !self.dynamic
    }

    pub fn arguments(&self) -> Vec<PromptArgument> {
        self.args
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
            .collect()
    }
}

/// Resource descriptor declaration
#[derive(Debug, Clone)]
pub struct ResourceDecl {
    pub uri: String,
    pub name: String,
    pub description: Option<String>,
    pub mime_type: Option<String>,
    /// Literal data; present iff every leaf was literal in the declaration
    pub data: Option<Value>,
    pub dynamic: bool,
}

impl ResourceDecl {
    /// Static iff every declared leaf is literal and no dynamic flag is set
    pub fn is_static(&self) -> bool {
        self.data.is_some() && !self.dynamic
    }
}

/// UI descriptor declaration
#[derive(Debug, Clone)]
pub struct UiDecl {
    pub uri: String,
    pub name: String,
    pub description: Option<String>,
    pub source: Option<String>,
    pub tools: Vec<String>,
    pub size: Option<UiSize>,
    pub css: Option<String>,
}

/// Which member class a binding must resolve against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Tool,
    Prompt,
    Resource,
    UiSource,
}

/// A method-name binding the handler set must provide
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub kind: BindingKind,
    /// The declared entry name (tool name, prompt name, resource URI)
    pub declared: String,
    /// The member name to look for (tool name; camelCase for dynamic
    /// prompts; the URI for dynamic resources)
    pub member: String,
}

/// Everything a declaration file lowers into
#[derive(Debug, Clone, Default)]
pub struct InterfaceModel {
    pub server: Option<ServerDecl>,
    pub tools: Vec<ToolDecl>,
    pub prompts: Vec<PromptDecl>,
    pub resources: Vec<ResourceDecl>,
    pub uis: Vec<UiDecl>,
}

impl InterfaceModel {
    /// The method bindings a handler set must satisfy
    pub fn bindings(&self) -> Vec<Binding> {
        let mut bindings = Vec::new();
        for tool in &self.tools {
            bindings.push(Binding {
                kind: BindingKind::Tool,
                declared: tool.name.clone(),
                member: tool.name.clone(),
            });
        }
        for prompt in &self.prompts {
            if !prompt.is_static() {
                bindings.push(Binding {
                    kind: BindingKind::Prompt,
                    declared: prompt.name.clone(),
                    member: tern_mcp_server::reconcile::to_camel_case(&prompt.name),
                });
            }
        }
        for resource in &self.resources {
            if !resource.is_static() {
                bindings.push(Binding {
                    kind: BindingKind::Resource,
                    declared: resource.uri.clone(),
                    member: resource.uri.clone(),
                });
            }
        }
        for ui in &self.uis {
            if ui.source.is_none() {
                bindings.push(Binding {
                    kind: BindingKind::UiSource,
                    declared: ui.uri.clone(),
                    member: ui.uri.clone(),
                });
            }
        }
        bindings
    }
}
