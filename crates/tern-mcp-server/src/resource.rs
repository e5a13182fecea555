//! MCP resource trait with static (literal) and dynamic (producer) forms

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use tern_mcp_protocol::content::ResourceContents;
use tern_mcp_protocol::resources::Resource;
use tern_mcp_protocol::{McpError, McpResult};

use crate::context::RequestContext;

/// High-level trait for implementing MCP resources
#[async_trait]
pub trait McpResource: Send + Sync {
    /// Unique resource URI
    fn uri(&self) -> &str;

    fn name(&self) -> &str;

    fn description(&self) -> Option<&str> {
        None
    }

    fn mime_type(&self) -> Option<&str> {
        None
    }

    /// Static resources return byte-identical payloads on every read
    fn is_static(&self) -> bool;

    async fn read(&self, ctx: RequestContext) -> McpResult<Vec<ResourceContents>>;

    /// The protocol descriptor advertised by `resources/list`
    fn to_resource(&self) -> Resource {
        let mut resource = Resource::new(self.uri(), self.name());
        if let Some(description) = self.description() {
            resource = resource.with_description(description);
        }
        if let Some(mime_type) = self.mime_type() {
            resource = resource.with_mime_type(mime_type);
        }
        resource
    }
}

/// A static resource: a stored literal serialized per its MIME type
pub struct StaticResource {
    uri: String,
    name: String,
    description: Option<String>,
    mime_type: String,
    data: Value,
}

impl StaticResource {
    pub fn new(uri: impl Into<String>, name: impl Into<String>, data: Value) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            description: None,
            mime_type: "application/json".to_string(),
            data,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    /// Serialize the literal per the declared MIME: text types carry string
    /// data verbatim, everything else is stable two-space JSON.
    fn serialize(&self) -> String {
        if self.mime_type.starts_with("text/") {
            if let Value::String(s) = &self.data {
                return s.clone();
            }
        }
        serde_json::to_string_pretty(&self.data).unwrap_or_else(|_| self.data.to_string())
    }
}

#[async_trait]
impl McpResource for StaticResource {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn mime_type(&self) -> Option<&str> {
        Some(&self.mime_type)
    }

    fn is_static(&self) -> bool {
        true
    }

    async fn read(&self, _ctx: RequestContext) -> McpResult<Vec<ResourceContents>> {
        Ok(vec![ResourceContents::text_with_mime(
            &self.uri,
            self.serialize(),
            &self.mime_type,
        )])
    }
}

/// Boxed async resource producer
pub type ResourceHandlerFn =
    Box<dyn Fn(RequestContext) -> BoxFuture<'static, McpResult<Value>> + Send + Sync>;

/// A dynamic resource: the producer runs once per read
pub struct FnResource {
    uri: String,
    name: String,
    description: Option<String>,
    mime_type: String,
    handler: ResourceHandlerFn,
}

impl FnResource {
    pub fn new<F, Fut>(uri: impl Into<String>, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = McpResult<Value>> + Send + 'static,
    {
        Self {
            uri: uri.into(),
            name: name.into(),
            description: None,
            mime_type: "application/json".to_string(),
            handler: Box::new(move |ctx| Box::pin(handler(ctx))),
        }
    }

    pub fn from_boxed(
        uri: impl Into<String>,
        name: impl Into<String>,
        handler: ResourceHandlerFn,
    ) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            description: None,
            mime_type: "application/json".to_string(),
            handler,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }
}

#[async_trait]
impl McpResource for FnResource {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn mime_type(&self) -> Option<&str> {
        Some(&self.mime_type)
    }

    fn is_static(&self) -> bool {
        false
    }

    async fn read(&self, ctx: RequestContext) -> McpResult<Vec<ResourceContents>> {
        let value = (self.handler)(ctx).await?;
        let text = match (&self.mime_type, &value) {
            (mime, Value::String(s)) if mime.starts_with("text/") => s.clone(),
            _ => serde_json::to_string_pretty(&value)
                .map_err(|e| McpError::tool_execution(e.to_string()))?,
        };
        Ok(vec![ResourceContents::text_with_mime(
            &self.uri, text, &self.mime_type,
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_static_reads_are_byte_identical() {
        let resource = StaticResource::new(
            "config://app",
            "App config",
            json!({"retries": 3, "debug": false}),
        );
        assert!(resource.is_static());

        let first = resource.read(RequestContext::new("s")).await.unwrap();
        let second = resource.read(RequestContext::new("s")).await.unwrap();
        let ResourceContents::Text(a) = &first[0] else { panic!() };
        let ResourceContents::Text(b) = &second[0] else { panic!() };
        assert_eq!(a.text, b.text);
        // Two-space indentation
        assert!(a.text.contains("  \"debug\""));
    }

    #[tokio::test]
    async fn test_static_text_mime_returns_raw_string() {
        let resource = StaticResource::new("doc://readme", "Readme", json!("# Title"))
            .with_mime_type("text/markdown");
        let contents = resource.read(RequestContext::new("s")).await.unwrap();
        let ResourceContents::Text(t) = &contents[0] else { panic!() };
        assert_eq!(t.text, "# Title");
        assert_eq!(t.mime_type.as_deref(), Some("text/markdown"));
    }

    #[tokio::test]
    async fn test_dynamic_producer_runs_per_read() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicU32, Ordering};

        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();
        let resource = FnResource::new("stats://search", "Search stats", move |_ctx| {
            let n = c.fetch_add(1, Ordering::SeqCst);
            async move { Ok(json!({"lastUpdated": n})) }
        });
        assert!(!resource.is_static());

        let first = resource.read(RequestContext::new("s")).await.unwrap();
        let second = resource.read(RequestContext::new("s")).await.unwrap();
        let ResourceContents::Text(a) = &first[0] else { panic!() };
        let ResourceContents::Text(b) = &second[0] else { panic!() };
        assert_ne!(a.text, b.text);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
