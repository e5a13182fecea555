//! UI resource builder

use tern_mcp_protocol::McpResult;
use tern_mcp_protocol::ui::UiSize;
use tern_mcp_server::ui::{UiEntry, UiSource, UiSourceValue};

/// Builder for UI resources
pub struct UiBuilder {
    uri: String,
    name: String,
    description: Option<String>,
    source: Option<UiSource>,
    tools: Vec<String>,
    size: Option<UiSize>,
    mime_override: Option<String>,
    css: Option<String>,
}

impl UiBuilder {
    pub fn new(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            description: None,
            source: None,
            tools: Vec::new(),
            size: None,
            mime_override: None,
            css: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Literal source string, classified at read time
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(UiSource::literal(source));
        self
    }

    /// Callable source, invoked per read
    pub fn source_fn<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(tern_mcp_server::RequestContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = McpResult<UiSourceValue>> + Send + 'static,
    {
        self.source = Some(UiSource::callable(f));
        self
    }

    /// Whitelist the tools this UI may call over the postMessage bridge
    pub fn allow_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.size = Some(UiSize { width, height });
        self
    }

    pub fn mime_override(mut self, mime: impl Into<String>) -> Self {
        self.mime_override = Some(mime.into());
        self
    }

    pub fn css(mut self, css: impl Into<String>) -> Self {
        self.css = Some(css.into());
        self
    }

    pub fn build(self) -> McpResult<UiEntry> {
        let source = self.source.ok_or_else(|| {
            tern_mcp_protocol::McpError::configuration(format!(
                "UI resource '{}' has no source",
                self.uri
            ))
        })?;
        let mut entry = UiEntry::new(self.uri, self.name, source)?.with_tools(self.tools);
        if let Some(description) = self.description {
            entry = entry.with_description(description);
        }
        if let Some(size) = self.size {
            entry = entry.with_size(size);
        }
        if let Some(mime) = self.mime_override {
            entry = entry.with_mime_override(mime);
        }
        if let Some(css) = self.css {
            entry = entry.with_css(css);
        }
        Ok(entry)
    }
}
