//! Tool builder for runtime tool construction

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use serde_json::Value;

use tern_mcp_protocol::schema::{JsonSchema, ObjectSchema};
use tern_mcp_protocol::{McpError, McpResult};
use tern_mcp_server::normalize::ToolOutput;
use tern_mcp_server::tool::FnTool;

/// Builder for creating tools at runtime without macros
pub struct ToolBuilder {
    name: String,
    description: Option<String>,
    input_schema: ObjectSchema,
    defaults: HashMap<String, Value>,
    timeout: Option<Duration>,
    execute_fn: Option<tern_mcp_server::tool::ToolHandlerFn>,
}

impl ToolBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: ObjectSchema::new(),
            defaults: HashMap::new(),
            timeout: None,
            execute_fn: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add an optional parameter
    pub fn param(mut self, name: impl Into<String>, schema: JsonSchema) -> Self {
        self.input_schema = self.input_schema.property(name, schema, false);
        self
    }

    /// Add a required parameter
    pub fn required_param(mut self, name: impl Into<String>, schema: JsonSchema) -> Self {
        self.input_schema = self.input_schema.property(name, schema, true);
        self
    }

    /// Add an optional parameter with a default filled in at validation
    pub fn param_with_default(
        mut self,
        name: impl Into<String>,
        schema: JsonSchema,
        default: Value,
    ) -> Self {
        let name = name.into();
        self.defaults.insert(name.clone(), default);
        self.input_schema = self.input_schema.property(name, schema, false);
        self
    }

    /// Add a required string parameter with a description
    pub fn string_param(self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.required_param(name, JsonSchema::string().with_description(description))
    }

    /// Add a required number parameter with a description
    pub fn number_param(self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.required_param(name, JsonSchema::number().with_description(description))
    }

    /// Add a required integer parameter with a description
    pub fn integer_param(self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.required_param(name, JsonSchema::integer().with_description(description))
    }

    /// Add a required boolean parameter with a description
    pub fn boolean_param(self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.required_param(name, JsonSchema::boolean().with_description(description))
    }

    /// Per-tool timeout override
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the execution function. The closure receives validated
    /// arguments and returns any JSON value; errors become tool errors.
    pub fn execute<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, String>> + Send + 'static,
    {
        self.execute_fn = Some(Box::new(move |args, _ctx| {
            let fut = f(args);
            Box::pin(async move {
                match fut.await {
                    Ok(value) => Ok(ToolOutput::Json(value)),
                    Err(message) => Err(McpError::tool_execution(message)),
                }
            })
        }));
        self
    }

    /// Set a context-aware execution function returning a [`ToolOutput`]
    pub fn execute_with_context<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Value, tern_mcp_server::RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<ToolOutput>> + Send + 'static,
    {
        self.execute_fn = Some(Box::new(move |args, ctx| Box::pin(f(args, ctx))));
        self
    }

    /// Build the tool
    pub fn build(self) -> McpResult<FnTool> {
        let handler = self
            .execute_fn
            .ok_or_else(|| McpError::configuration(format!(
                "tool '{}' has no execution function",
                self.name
            )))?;
        let mut schema = self.input_schema;
        if !self.defaults.is_empty() {
            schema = schema.with_defaults(self.defaults);
        }
        let mut tool = FnTool::from_boxed(self.name, schema, handler);
        if let Some(description) = self.description {
            tool = tool.with_description(description);
        }
        if let Some(timeout) = self.timeout {
            tool = tool.with_timeout(timeout);
        }
        Ok(tool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tern_mcp_server::tool::McpTool;

    #[tokio::test]
    async fn test_builder_produces_working_tool() {
        let tool = ToolBuilder::new("add")
            .description("Add two numbers")
            .number_param("a", "First operand")
            .number_param("b", "Second operand")
            .execute(|args| async move {
                let sum = args["a"].as_f64().unwrap_or(0.0) + args["b"].as_f64().unwrap_or(0.0);
                Ok(json!(sum))
            })
            .build()
            .unwrap();

        assert_eq!(tool.name(), "add");
        let validated = tool.input_schema().validate(&json!({"a": 1, "b": 2})).unwrap();
        let output = tool
            .call(validated, tern_mcp_server::RequestContext::new("t"))
            .await
            .unwrap();
        let ToolOutput::Json(value) = output else { panic!() };
        assert_eq!(value, json!(3.0));
    }

    #[test]
    fn test_missing_execute_fails() {
        let err = ToolBuilder::new("incomplete").build().unwrap_err();
        assert!(err.to_string().contains("no execution function"));
    }

    #[test]
    fn test_defaults_attached_to_schema() {
        let tool = ToolBuilder::new("greet")
            .string_param("name", "Who to greet")
            .param_with_default("greeting", JsonSchema::string(), json!("hello"))
            .execute(|args| async move { Ok(args) })
            .build()
            .unwrap();
        let validated = tool
            .input_schema()
            .validate(&json!({"name": "sam"}))
            .unwrap();
        assert_eq!(validated["greeting"], "hello");
    }
}
