//! Initialization handshake types and the capability snapshot

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::version::McpVersion;

/// Name and version of an MCP implementation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Implementation {
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Implementation {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Client-side roots capability
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootsCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Client-side sampling capability
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// Client-side elicitation capability
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElicitationCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// Capabilities a client may advertise
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roots: Option<RootsCapabilities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<SamplingCapabilities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elicitation: Option<ElicitationCapabilities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<HashMap<String, Value>>,
}

impl ClientCapabilities {
    pub fn supports_sampling(&self) -> bool {
        self.sampling
            .as_ref()
            .is_some_and(|s| s.enabled.unwrap_or(true))
    }

    pub fn supports_elicitation(&self) -> bool {
        self.elicitation
            .as_ref()
            .is_some_and(|e| e.enabled.unwrap_or(true))
    }
}

/// Server-side tools capability
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Server-side prompts capability
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptsCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Server-side resources capability
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Server-side completions capability
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionsCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// Server-side UI resources capability (tern extension, advertised under
/// the experimental block by spec-conservative clients)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// Server-side subscriptions capability, advertised top-level alongside
/// the per-resource `subscribe` flag
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionsCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// Capabilities a server may advertise
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapabilities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<PromptsCapabilities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapabilities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscriptions: Option<SubscriptionsCapabilities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completions: Option<CompletionsCapabilities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roots: Option<RootsCapabilities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui: Option<UiCapabilities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<HashMap<String, Value>>,
}

/// The boolean per-class view used by `initialize`: a flag is true iff at
/// least one entry of that class is registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitySnapshot {
    pub tools: bool,
    pub prompts: bool,
    pub resources: bool,
    pub ui: bool,
    pub subscriptions: bool,
    pub completions: bool,
    pub roots: bool,
}

impl CapabilitySnapshot {
    /// Expand into the structured capability object: every snapshot flag
    /// maps to its own top-level entry
    pub fn to_capabilities(&self) -> ServerCapabilities {
        ServerCapabilities {
            tools: self.tools.then(ToolsCapabilities::default),
            prompts: self.prompts.then(PromptsCapabilities::default),
            resources: self.resources.then(|| ResourcesCapabilities {
                subscribe: Some(self.subscriptions),
                list_changed: Some(false),
            }),
            subscriptions: self.subscriptions.then(|| SubscriptionsCapabilities {
                enabled: Some(true),
            }),
            completions: self.completions.then(|| CompletionsCapabilities {
                enabled: Some(true),
            }),
            roots: self.roots.then(|| RootsCapabilities {
                list_changed: Some(false),
            }),
            ui: self.ui.then(|| UiCapabilities { enabled: Some(true) }),
            experimental: None,
        }
    }
}

/// `initialize` request parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequest {
    pub protocol_version: McpVersion,
    pub capabilities: ClientCapabilities,
    pub client_info: Implementation,
}

/// `initialize` response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: McpVersion,
    pub capabilities: ServerCapabilities,
    pub server_info: Implementation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl InitializeResult {
    pub fn new(server_info: Implementation, capabilities: ServerCapabilities) -> Self {
        Self {
            protocol_version: McpVersion::default(),
            capabilities,
            server_info,
            instructions: None,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_expansion() {
        let snapshot = CapabilitySnapshot {
            tools: true,
            resources: true,
            subscriptions: true,
            ..Default::default()
        };
        let caps = snapshot.to_capabilities();
        assert!(caps.tools.is_some());
        assert!(caps.prompts.is_none());
        assert_eq!(caps.resources.unwrap().subscribe, Some(true));
        assert!(caps.subscriptions.is_some());
        assert!(caps.roots.is_none());
    }

    #[test]
    fn test_every_snapshot_flag_surfaces_top_level() {
        let snapshot = CapabilitySnapshot {
            tools: true,
            prompts: true,
            resources: true,
            ui: true,
            subscriptions: true,
            completions: true,
            roots: true,
        };
        let wire = serde_json::to_value(snapshot.to_capabilities()).unwrap();
        for class in [
            "tools",
            "prompts",
            "resources",
            "ui",
            "subscriptions",
            "completions",
            "roots",
        ] {
            assert!(wire.get(class).is_some(), "missing capability '{class}'");
        }
    }

    #[test]
    fn test_initialize_result_wire_shape() {
        let result = InitializeResult::new(
            Implementation::new("weather", "1.0.0"),
            CapabilitySnapshot::default().to_capabilities(),
        );
        let wire = serde_json::to_value(&result).unwrap();
        assert_eq!(wire["protocolVersion"], "2025-06-18");
        assert_eq!(wire["serverInfo"]["name"], "weather");
    }

    #[test]
    fn test_client_capability_probes() {
        let caps: ClientCapabilities =
            serde_json::from_value(serde_json::json!({"sampling": {}})).unwrap();
        assert!(caps.supports_sampling());
        assert!(!caps.supports_elicitation());
    }
}
