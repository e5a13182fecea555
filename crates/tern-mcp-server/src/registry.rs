//! The in-memory registry of tools, prompts, resources, and UI resources
//!
//! Registration fails fast on duplicate canonical names. The registry is
//! append-only once the server is running; the state machine in
//! [`crate::server`] enforces that by rejecting `add_*` after start.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;

use tern_mcp_protocol::completion::Completion;
use tern_mcp_protocol::initialize::CapabilitySnapshot;
use tern_mcp_protocol::roots::Root;
use tern_mcp_protocol::{McpError, McpResult};

use crate::prompt::McpPrompt;
use crate::resource::McpResource;
use crate::tool::McpTool;
use crate::ui::UiEntry;

/// Boxed completion provider attached to a prompt name or resource URI
pub type CompletionFn =
    Arc<dyn Fn(String, String) -> BoxFuture<'static, McpResult<Completion>> + Send + Sync>;

/// Name/URI-keyed maps for the four primitive classes
#[derive(Default)]
pub struct Registry {
    tools: HashMap<String, Arc<dyn McpTool>>,
    prompts: HashMap<String, Arc<dyn McpPrompt>>,
    resources: HashMap<String, Arc<dyn McpResource>>,
    uis: HashMap<String, Arc<UiEntry>>,
    completions: HashMap<String, CompletionFn>,
    roots: Vec<Root>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_tool(&mut self, tool: Arc<dyn McpTool>) -> McpResult<()> {
        let name = tool.name().to_string();
        tool.input_schema().check_patterns().map_err(|violation| {
            McpError::configuration(format!("tool '{}': {}", name, violation))
        })?;
        if self.tools.contains_key(&name) {
            return Err(McpError::configuration(format!(
                "tool '{}' is already registered",
                name
            )));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn insert_prompt(&mut self, prompt: Arc<dyn McpPrompt>) -> McpResult<()> {
        let name = prompt.name().to_string();
        if self.prompts.contains_key(&name) {
            return Err(McpError::configuration(format!(
                "prompt '{}' is already registered",
                name
            )));
        }
        self.prompts.insert(name, prompt);
        Ok(())
    }

    pub fn insert_resource(&mut self, resource: Arc<dyn McpResource>) -> McpResult<()> {
        let uri = resource.uri().to_string();
        if self.resources.contains_key(&uri) || self.uis.contains_key(&uri) {
            return Err(McpError::configuration(format!(
                "resource '{}' is already registered",
                uri
            )));
        }
        self.resources.insert(uri, resource);
        Ok(())
    }

    pub fn insert_ui(&mut self, ui: UiEntry) -> McpResult<()> {
        let uri = ui.uri().to_string();
        if self.uis.contains_key(&uri) || self.resources.contains_key(&uri) {
            return Err(McpError::configuration(format!(
                "UI resource '{}' is already registered",
                uri
            )));
        }
        self.uis.insert(uri, Arc::new(ui));
        Ok(())
    }

    /// Attach a completion provider to a prompt name or resource URI
    pub fn insert_completion(&mut self, key: impl Into<String>, provider: CompletionFn) {
        self.completions.insert(key.into(), provider);
    }

    pub fn add_root(&mut self, root: Root) {
        self.roots.push(root);
    }

    pub fn tool(&self, name: &str) -> Option<Arc<dyn McpTool>> {
        self.tools.get(name).cloned()
    }

    pub fn prompt(&self, name: &str) -> Option<Arc<dyn McpPrompt>> {
        self.prompts.get(name).cloned()
    }

    pub fn resource(&self, uri: &str) -> Option<Arc<dyn McpResource>> {
        self.resources.get(uri).cloned()
    }

    pub fn ui(&self, uri: &str) -> Option<Arc<UiEntry>> {
        self.uis.get(uri).cloned()
    }

    pub fn completion(&self, key: &str) -> Option<CompletionFn> {
        self.completions.get(key).cloned()
    }

    /// Whether a URI names a readable entry (resource or UI)
    pub fn has_readable(&self, uri: &str) -> bool {
        self.resources.contains_key(uri) || self.uis.contains_key(uri)
    }

    pub fn tools(&self) -> impl Iterator<Item = &Arc<dyn McpTool>> {
        self.tools.values()
    }

    pub fn prompts(&self) -> impl Iterator<Item = &Arc<dyn McpPrompt>> {
        self.prompts.values()
    }

    pub fn resources(&self) -> impl Iterator<Item = &Arc<dyn McpResource>> {
        self.resources.values()
    }

    pub fn uis(&self) -> impl Iterator<Item = &Arc<UiEntry>> {
        self.uis.values()
    }

    pub fn roots(&self) -> &[Root] {
        &self.roots
    }

    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn counts(&self) -> (usize, usize, usize, usize) {
        (
            self.tools.len(),
            self.prompts.len(),
            self.resources.len(),
            self.uis.len(),
        )
    }

    /// The capability snapshot: a flag is true iff the class is non-empty
    pub fn snapshot(&self) -> CapabilitySnapshot {
        CapabilitySnapshot {
            tools: !self.tools.is_empty(),
            prompts: !self.prompts.is_empty(),
            resources: !self.resources.is_empty() || !self.uis.is_empty(),
            ui: !self.uis.is_empty(),
            subscriptions: !self.resources.is_empty() || !self.uis.is_empty(),
            completions: !self.completions.is_empty(),
            roots: !self.roots.is_empty(),
        }
    }

    /// Start-time cross-validation: every tool a UI whitelists must be a
    /// registered tool. All missing names compose into one error.
    pub fn validate(&self) -> McpResult<()> {
        let mut missing: Vec<String> = Vec::new();
        for ui in self.uis.values() {
            for tool in ui.tools() {
                if !self.tools.contains_key(tool) {
                    missing.push(format!("'{}' (whitelisted by {})", tool, ui.uri()));
                }
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            missing.sort();
            Err(McpError::configuration(format!(
                "UI tool whitelist references unregistered tools: {}",
                missing.join(", ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::ToolOutput;
    use crate::tool::FnTool;
    use crate::ui::{UiSource, UiEntry};
    use tern_mcp_protocol::schema::ObjectSchema;

    fn tool(name: &str) -> Arc<dyn McpTool> {
        Arc::new(FnTool::new(name, ObjectSchema::new(), |_args, _ctx| async {
            Ok(ToolOutput::text("ok"))
        }))
    }

    #[test]
    fn test_duplicate_tool_rejected() {
        let mut registry = Registry::new();
        registry.insert_tool(tool("add")).unwrap();
        let err = registry.insert_tool(tool("add")).unwrap_err();
        assert!(err.to_string().contains("already registered"));
    }

    #[test]
    fn test_capability_snapshot_tracks_registry() {
        let mut registry = Registry::new();
        assert!(!registry.snapshot().tools);
        registry.insert_tool(tool("add")).unwrap();
        assert!(registry.snapshot().tools);
        assert!(!registry.snapshot().prompts);
    }

    #[test]
    fn test_ui_whitelist_validation() {
        let mut registry = Registry::new();
        registry.insert_tool(tool("add")).unwrap();
        registry
            .insert_ui(
                UiEntry::new("ui://calculator", "Calculator", UiSource::literal("<div/>"))
                    .unwrap()
                    .with_tools(vec!["add".to_string(), "subtract".to_string()]),
            )
            .unwrap();

        let err = registry.validate().unwrap_err();
        assert!(err.to_string().contains("subtract"));
        assert!(!err.to_string().contains("'add'"));

        registry.insert_tool(tool("subtract")).unwrap();
        assert!(registry.validate().is_ok());
    }

    #[test]
    fn test_ui_and_resource_share_uri_space() {
        let mut registry = Registry::new();
        registry
            .insert_ui(UiEntry::new("ui://x", "x", UiSource::literal("<div/>")).unwrap())
            .unwrap();
        let err = registry
            .insert_resource(Arc::new(crate::resource::StaticResource::new(
                "ui://x",
                "clash",
                serde_json::json!({}),
            )))
            .unwrap_err();
        assert!(err.to_string().contains("already registered"));
    }

    #[test]
    fn test_bad_tool_pattern_fails_registration() {
        let mut registry = Registry::new();
        let schema = ObjectSchema::new().property(
            "code",
            tern_mcp_protocol::schema::JsonSchema::string().with_pattern("([bad"),
            true,
        );
        let bad = Arc::new(FnTool::new("bad", schema, |_a, _c| async {
            Ok(ToolOutput::text("x"))
        }));
        assert!(registry.insert_tool(bad).is_err());
    }
}
