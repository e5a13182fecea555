//! Tool discovery and invocation types

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::content::ContentBlock;
use crate::schema::ObjectSchema;

/// A tool descriptor as advertised by `tools/list`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: ObjectSchema,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<ObjectSchema>,
}

impl Tool {
    pub fn new(name: impl Into<String>, input_schema: ObjectSchema) -> Self {
        Self {
            name: name.into(),
            title: None,
            description: None,
            input_schema,
            output_schema: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// `tools/list` response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListToolsResult {
    pub tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl ListToolsResult {
    pub fn new(tools: Vec<Tool>) -> Self {
        Self {
            tools,
            next_cursor: None,
        }
    }
}

/// `tools/call` request parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

/// `tools/call` response.
///
/// Handler failures set `is_error` - the transport response is still a
/// success so the client can inspect the message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    pub content: Vec<ContentBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
}

impl CallToolResult {
    pub fn success(content: Vec<ContentBlock>) -> Self {
        Self {
            content,
            is_error: None,
            structured_content: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(message)],
            is_error: Some(true),
            structured_content: None,
        }
    }

    pub fn with_structured(mut self, value: Value) -> Self {
        self.structured_content = Some(value);
        self
    }

    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::JsonSchema;

    #[test]
    fn test_tool_wire_shape() {
        let tool = Tool::new(
            "get_temperature",
            ObjectSchema::new().property("location", JsonSchema::string(), true),
        )
        .with_description("Current temperature for a location");
        let wire = serde_json::to_value(&tool).unwrap();
        assert_eq!(wire["name"], "get_temperature");
        assert_eq!(wire["inputSchema"]["type"], "object");
    }

    #[test]
    fn test_error_result_flags() {
        let result = CallToolResult::error("boom");
        assert!(result.is_error());
        assert_eq!(result.content[0].as_text(), Some("boom"));

        let ok = CallToolResult::success(vec![ContentBlock::text("fine")]);
        assert!(!ok.is_error());
        let wire = serde_json::to_value(&ok).unwrap();
        assert!(wire.get("isError").is_none());
    }
}
