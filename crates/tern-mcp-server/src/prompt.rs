//! MCP prompt trait with static (template) and dynamic (generator) forms
//!
//! Classification happens at registration: a literal template with no
//! dynamic flag is static and renders deterministically; everything else is
//! a generator invoked once per `prompts/get`.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use tern_mcp_protocol::prompts::{Prompt, PromptArgument, PromptMessage};
use tern_mcp_protocol::{McpError, McpResult};

use crate::template::render_template;

/// High-level trait for implementing MCP prompts
#[async_trait]
pub trait McpPrompt: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> Option<&str> {
        None
    }

    fn arguments(&self) -> &[PromptArgument];

    /// Static prompts render deterministically from their template
    fn is_static(&self) -> bool;

    /// Render with arguments whose required-presence was already checked
    async fn render(&self, args: HashMap<String, Value>) -> McpResult<Vec<PromptMessage>>;

    /// Enforce required-argument presence; a missing required argument is
    /// invalid-params before any rendering happens
    fn check_required(&self, args: &HashMap<String, Value>) -> McpResult<()> {
        for arg in self.arguments() {
            if arg.is_required() && !args.contains_key(&arg.name) {
                return Err(McpError::missing_param(&arg.name));
            }
        }
        Ok(())
    }

    /// The protocol descriptor advertised by `prompts/list`
    fn to_prompt(&self) -> Prompt {
        let mut prompt = Prompt::new(self.name());
        if let Some(description) = self.description() {
            prompt = prompt.with_description(description);
        }
        if !self.arguments().is_empty() {
            prompt = prompt.with_arguments(self.arguments().to_vec());
        }
        prompt
    }
}

/// A static prompt: literal template, `{placeholder}` interpolation
pub struct TemplatePrompt {
    name: String,
    description: Option<String>,
    arguments: Vec<PromptArgument>,
    template: String,
}

impl TemplatePrompt {
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            arguments: Vec::new(),
            template: template.into(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_arguments(mut self, arguments: Vec<PromptArgument>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn argument(mut self, argument: PromptArgument) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

#[async_trait]
impl McpPrompt for TemplatePrompt {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn arguments(&self) -> &[PromptArgument] {
        &self.arguments
    }

    fn is_static(&self) -> bool {
        true
    }

    async fn render(&self, args: HashMap<String, Value>) -> McpResult<Vec<PromptMessage>> {
        let declared: Vec<String> = self.arguments.iter().map(|a| a.name.clone()).collect();
        let text = render_template(&self.template, &args, &declared);
        Ok(vec![PromptMessage::user(text)])
    }
}

/// Boxed async prompt generator
pub type PromptHandlerFn = Box<
    dyn Fn(HashMap<String, Value>) -> BoxFuture<'static, McpResult<Vec<PromptMessage>>>
        + Send
        + Sync,
>;

/// A dynamic prompt backed by a generator function
pub struct FnPrompt {
    name: String,
    description: Option<String>,
    arguments: Vec<PromptArgument>,
    handler: PromptHandlerFn,
}

impl FnPrompt {
    pub fn new<F, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(HashMap<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = McpResult<Vec<PromptMessage>>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: None,
            arguments: Vec::new(),
            handler: Box::new(move |args| Box::pin(handler(args))),
        }
    }

    pub fn from_boxed(name: impl Into<String>, handler: PromptHandlerFn) -> Self {
        Self {
            name: name.into(),
            description: None,
            arguments: Vec::new(),
            handler,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_arguments(mut self, arguments: Vec<PromptArgument>) -> Self {
        self.arguments = arguments;
        self
    }
}

#[async_trait]
impl McpPrompt for FnPrompt {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn arguments(&self) -> &[PromptArgument] {
        &self.arguments
    }

    fn is_static(&self) -> bool {
        false
    }

    async fn render(&self, args: HashMap<String, Value>) -> McpResult<Vec<PromptMessage>> {
        (self.handler)(args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn weather_report() -> TemplatePrompt {
        TemplatePrompt::new(
            "weather_report",
            "Report for {location}. {includeExtended ? 'Extended.' : '3-day.'}",
        )
        .argument(PromptArgument::new("location").required())
        .argument(PromptArgument::new("includeExtended"))
    }

    #[tokio::test]
    async fn test_static_interpolation() {
        let prompt = weather_report();
        assert!(prompt.is_static());
        let args = HashMap::from([
            ("location".to_string(), json!("Tokyo")),
            ("includeExtended".to_string(), json!(true)),
        ]);
        prompt.check_required(&args).unwrap();
        let messages = prompt.render(args).await.unwrap();
        assert_eq!(
            messages[0].content.as_text(),
            Some("Report for Tokyo. Extended.")
        );
    }

    #[test]
    fn test_missing_required_argument() {
        let prompt = weather_report();
        let err = prompt.check_required(&HashMap::new()).unwrap_err();
        let McpError::MissingParameter(name) = err else {
            panic!("expected MissingParameter, got {err:?}");
        };
        assert_eq!(name, "location");
    }

    #[tokio::test]
    async fn test_dynamic_prompt_invoked_per_render() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicU32, Ordering};

        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let prompt = FnPrompt::new("fresh", move |_args| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok(vec![PromptMessage::user(format!("call {n}"))]) }
        });
        assert!(!prompt.is_static());

        let first = prompt.render(HashMap::new()).await.unwrap();
        let second = prompt.render(HashMap::new()).await.unwrap();
        assert_ne!(
            first[0].content.as_text(),
            second[0].content.as_text()
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
