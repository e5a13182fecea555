//! UI resource entries
//!
//! A UI entry carries a polymorphic `source`: a literal string classified
//! into one of six delivery modes, or a callable producing such a string at
//! read time. Classification and compilation live in [`crate::uires`].

use std::sync::Arc;

use futures::future::BoxFuture;

use tern_mcp_protocol::resources::Resource;
use tern_mcp_protocol::ui::{UI_URI_PREFIX, UiResource, UiSize};
use tern_mcp_protocol::{McpError, McpResult};

use crate::context::RequestContext;

/// What a UI source callable may produce. Returning another callable is an
/// execution error: one level of indirection only.
pub enum UiSourceValue {
    Text(String),
    Callable(UiSourceFn),
}

impl From<String> for UiSourceValue {
    fn from(s: String) -> Self {
        UiSourceValue::Text(s)
    }
}

impl From<&str> for UiSourceValue {
    fn from(s: &str) -> Self {
        UiSourceValue::Text(s.to_string())
    }
}

/// Boxed async UI source producer
pub type UiSourceFn =
    Arc<dyn Fn(RequestContext) -> BoxFuture<'static, McpResult<UiSourceValue>> + Send + Sync>;

/// A UI source: literal or callable
#[derive(Clone)]
pub enum UiSource {
    Literal(String),
    Callable(UiSourceFn),
}

impl std::fmt::Debug for UiSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UiSource::Literal(s) => f.debug_tuple("Literal").field(s).finish(),
            UiSource::Callable(_) => f.debug_tuple("Callable").field(&"<fn>").finish(),
        }
    }
}

impl UiSource {
    pub fn literal(source: impl Into<String>) -> Self {
        UiSource::Literal(source.into())
    }

    pub fn callable<F, Fut>(f: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = McpResult<UiSourceValue>> + Send + 'static,
    {
        UiSource::Callable(Arc::new(move |ctx| Box::pin(f(ctx))))
    }
}

/// A registered UI resource
#[derive(Debug)]
pub struct UiEntry {
    uri: String,
    name: String,
    description: Option<String>,
    source: UiSource,
    /// Tool names the UI may invoke over the client's postMessage bridge
    tools: Vec<String>,
    size: Option<UiSize>,
    mime_override: Option<String>,
    css: Option<String>,
}

impl UiEntry {
    pub fn new(uri: impl Into<String>, name: impl Into<String>, source: UiSource) -> McpResult<Self> {
        let uri = uri.into();
        if !uri.starts_with(UI_URI_PREFIX) {
            return Err(McpError::configuration(format!(
                "UI resource URI '{}' must start with '{}'",
                uri, UI_URI_PREFIX
            )));
        }
        Ok(Self {
            uri,
            name: name.into(),
            description: None,
            source,
            tools: Vec::new(),
            size: None,
            mime_override: None,
            css: None,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_size(mut self, size: UiSize) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_mime_override(mut self, mime: impl Into<String>) -> Self {
        self.mime_override = Some(mime.into());
        self
    }

    pub fn with_css(mut self, css: impl Into<String>) -> Self {
        self.css = Some(css.into());
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn tools(&self) -> &[String] {
        &self.tools
    }

    pub fn size(&self) -> Option<UiSize> {
        self.size
    }

    pub fn mime_override(&self) -> Option<&str> {
        self.mime_override.as_deref()
    }

    pub fn css(&self) -> Option<&str> {
        self.css.as_deref()
    }

    /// Resolve the source to a string, invoking a callable at most once
    pub async fn resolve_source(&self, ctx: RequestContext) -> McpResult<String> {
        match &self.source {
            UiSource::Literal(text) => Ok(text.clone()),
            UiSource::Callable(producer) => match producer(ctx).await? {
                UiSourceValue::Text(text) => Ok(text),
                UiSourceValue::Callable(_) => Err(McpError::tool_execution(format!(
                    "UI source for '{}' returned another callable",
                    self.uri
                ))),
            },
        }
    }

    /// The descriptor advertised under `resources/list`
    pub fn to_resource(&self) -> Resource {
        let mut resource = Resource::new(&self.uri, &self.name);
        if let Some(description) = &self.description {
            resource = resource.with_description(description.clone());
        }
        resource
    }

    /// The UI-specific descriptor (tool whitelist, preferred size)
    pub fn to_ui_resource(&self) -> UiResource {
        UiResource {
            uri: self.uri.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            tools: self.tools.clone(),
            size: self.size,
            mime_type: self.mime_override.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_prefix_enforced() {
        let err = UiEntry::new("web://x", "x", UiSource::literal("<div/>")).unwrap_err();
        assert!(matches!(err, McpError::Configuration(_)));
        assert!(UiEntry::new("ui://x", "x", UiSource::literal("<div/>")).is_ok());
    }

    #[tokio::test]
    async fn test_callable_source_resolves_once() {
        let entry = UiEntry::new(
            "ui://clock",
            "clock",
            UiSource::callable(|_ctx| async { Ok(UiSourceValue::from("<time>now</time>")) }),
        )
        .unwrap();
        let source = entry.resolve_source(RequestContext::new("s")).await.unwrap();
        assert_eq!(source, "<time>now</time>");
    }

    #[tokio::test]
    async fn test_callable_returning_callable_rejected() {
        let inner: UiSourceFn =
            Arc::new(|_ctx| Box::pin(async { Ok(UiSourceValue::from("<div/>")) }));
        let entry = UiEntry::new(
            "ui://nested",
            "nested",
            UiSource::callable(move |_ctx| {
                let inner = inner.clone();
                async move { Ok(UiSourceValue::Callable(inner)) }
            }),
        )
        .unwrap();
        let err = entry
            .resolve_source(RequestContext::new("s"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("another callable"));
    }
}
