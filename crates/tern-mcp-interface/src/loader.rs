//! Lowering a parsed model into the kernel
//!
//! The interface frontend lowers through the functional path: the parsed
//! model becomes a config object, and the handler set resolves through the
//! same reconciler-backed loader every frontend shares. Missing bindings
//! for dynamic prompts and resources fail start with one composed error
//! naming each miss and the variants tried.

use tern_mcp_builders::config::{
    HandlerMap, McpConfig, PromptArgConfig, PromptConfig, ResourceConfig, ToolConfig, UiConfig,
    load_config,
};
use tern_mcp_server::{McpServer, Result};

use crate::model::InterfaceModel;

/// Lower a parsed interface model and its handler set into a built server
pub fn lower_model(model: InterfaceModel, handlers: HandlerMap) -> Result<McpServer> {
    let (name, version, description) = match &model.server {
        Some(server) => (
            server.name.clone(),
            server.version.clone(),
            server.description.clone(),
        ),
        None => {
            return Err(tern_mcp_server::FrameworkError::config(
                "interface file declares no server descriptor",
            ));
        }
    };

    let config = McpConfig {
        name,
        version,
        description,
        base_path: None,
        tools: model
            .tools
            .iter()
            .map(|tool| ToolConfig {
                name: tool.name.clone(),
                description: tool.description.clone(),
                schema: tool.input_schema(),
                timeout_ms: None,
            })
            .collect(),
        prompts: model
            .prompts
            .iter()
            .map(|prompt| PromptConfig {
                name: prompt.name.clone(),
                description: prompt.description.clone(),
                arguments: prompt
                    .args
                    .iter()
                    .map(|arg| PromptArgConfig {
                        name: arg.name.clone(),
                        description: arg.description.clone(),
                        required: arg.required,
                    })
                    .collect(),
                template: prompt.template.clone(),
                dynamic: prompt.dynamic,
            })
            .collect(),
        resources: model
            .resources
            .iter()
            .map(|resource| ResourceConfig {
                uri: resource.uri.clone(),
                name: resource.name.clone(),
                description: resource.description.clone(),
                mime_type: resource.mime_type.clone(),
                data: resource.data.clone(),
                dynamic: resource.dynamic,
            })
            .collect(),
        uis: model
            .uis
            .iter()
            .map(|ui| UiConfig {
                uri: ui.uri.clone(),
                name: ui.name.clone(),
                description: ui.description.clone(),
                source: ui.source.clone(),
                tools: ui.tools.clone(),
                size: ui.size,
                mime_type: None,
            })
            .collect(),
    };

    load_config(config, handlers)
}
