//! Prompt builder with static and dynamic forms

use std::collections::HashMap;
use std::future::Future;

use serde_json::Value;

use tern_mcp_protocol::prompts::{PromptArgument, PromptMessage};
use tern_mcp_protocol::{McpError, McpResult};
use tern_mcp_server::prompt::{FnPrompt, McpPrompt, TemplatePrompt};

/// The classified product of a [`PromptBuilder`]
pub enum BuiltPrompt {
    Static(TemplatePrompt),
    Dynamic(FnPrompt),
}

impl std::fmt::Debug for BuiltPrompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuiltPrompt::Static(_) => f.debug_tuple("Static").finish(),
            BuiltPrompt::Dynamic(_) => f.debug_tuple("Dynamic").finish(),
        }
    }
}

#[async_trait::async_trait]
impl McpPrompt for BuiltPrompt {
    fn name(&self) -> &str {
        match self {
            BuiltPrompt::Static(p) => p.name(),
            BuiltPrompt::Dynamic(p) => p.name(),
        }
    }

    fn description(&self) -> Option<&str> {
        match self {
            BuiltPrompt::Static(p) => p.description(),
            BuiltPrompt::Dynamic(p) => p.description(),
        }
    }

    fn arguments(&self) -> &[PromptArgument] {
        match self {
            BuiltPrompt::Static(p) => p.arguments(),
            BuiltPrompt::Dynamic(p) => p.arguments(),
        }
    }

    fn is_static(&self) -> bool {
        matches!(self, BuiltPrompt::Static(_))
    }

    async fn render(&self, args: HashMap<String, Value>) -> McpResult<Vec<PromptMessage>> {
        match self {
            BuiltPrompt::Static(p) => p.render(args).await,
            BuiltPrompt::Dynamic(p) => p.render(args).await,
        }
    }
}

/// Builder for prompts. A literal template with no generator classifies as
/// static; a generator classifies as dynamic; declaring both is an error.
pub struct PromptBuilder {
    name: String,
    description: Option<String>,
    arguments: Vec<PromptArgument>,
    template: Option<String>,
    generator: Option<tern_mcp_server::prompt::PromptHandlerFn>,
}

impl PromptBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            arguments: Vec::new(),
            template: None,
            generator: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declare an argument
    pub fn arg(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        let mut argument = PromptArgument::new(name).with_description(description);
        if required {
            argument = argument.required();
        }
        self.arguments.push(argument);
        self
    }

    /// Provide the literal template (static form)
    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Provide the generator (dynamic form)
    pub fn generator<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(HashMap<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<Vec<PromptMessage>>> + Send + 'static,
    {
        self.generator = Some(Box::new(move |args| Box::pin(f(args))));
        self
    }

    /// Build and classify
    pub fn build(self) -> McpResult<BuiltPrompt> {
        match (self.template, self.generator) {
            (Some(template), None) => {
                let mut prompt =
                    TemplatePrompt::new(self.name, template).with_arguments(self.arguments);
                if let Some(description) = self.description {
                    prompt = prompt.with_description(description);
                }
                Ok(BuiltPrompt::Static(prompt))
            }
            (None, Some(generator)) => {
                let mut prompt = FnPrompt::from_boxed(self.name, generator)
                    .with_arguments(self.arguments);
                if let Some(description) = self.description {
                    prompt = prompt.with_description(description);
                }
                Ok(BuiltPrompt::Dynamic(prompt))
            }
            (Some(_), Some(_)) => Err(McpError::configuration(format!(
                "prompt '{}' declares both a template and a generator",
                self.name
            ))),
            (None, None) => Err(McpError::configuration(format!(
                "prompt '{}' needs a template or a generator",
                self.name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_static_classification_and_render() {
        let prompt = PromptBuilder::new("weather_report")
            .description("Weather report")
            .arg("location", "City name", true)
            .template("Report for {location}.")
            .build()
            .unwrap();
        assert!(prompt.is_static());

        let messages = prompt
            .render(HashMap::from([("location".to_string(), json!("Oslo"))]))
            .await
            .unwrap();
        assert_eq!(messages[0].content.as_text(), Some("Report for Oslo."));
    }

    #[test]
    fn test_dynamic_classification() {
        let prompt = PromptBuilder::new("fresh")
            .generator(|_args| async { Ok(vec![PromptMessage::user("generated")]) })
            .build()
            .unwrap();
        assert!(!prompt.is_static());
    }

    #[test]
    fn test_both_forms_rejected() {
        let err = PromptBuilder::new("confused")
            .template("{x}")
            .generator(|_args| async { Ok(vec![]) })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("both"));
    }
}
