//! Resource builder with static and dynamic forms

use std::future::Future;

use serde_json::Value;

use tern_mcp_protocol::content::ResourceContents;
use tern_mcp_protocol::resources::Resource;
use tern_mcp_protocol::{McpError, McpResult};
use tern_mcp_server::RequestContext;
use tern_mcp_server::resource::{FnResource, McpResource, StaticResource};

/// The classified product of a [`ResourceBuilder`]
pub enum BuiltResource {
    Static(StaticResource),
    Dynamic(FnResource),
}

#[async_trait::async_trait]
impl McpResource for BuiltResource {
    fn uri(&self) -> &str {
        match self {
            BuiltResource::Static(r) => r.uri(),
            BuiltResource::Dynamic(r) => r.uri(),
        }
    }

    fn name(&self) -> &str {
        match self {
            BuiltResource::Static(r) => r.name(),
            BuiltResource::Dynamic(r) => r.name(),
        }
    }

    fn description(&self) -> Option<&str> {
        match self {
            BuiltResource::Static(r) => r.description(),
            BuiltResource::Dynamic(r) => r.description(),
        }
    }

    fn mime_type(&self) -> Option<&str> {
        match self {
            BuiltResource::Static(r) => r.mime_type(),
            BuiltResource::Dynamic(r) => r.mime_type(),
        }
    }

    fn is_static(&self) -> bool {
        matches!(self, BuiltResource::Static(_))
    }

    async fn read(&self, ctx: RequestContext) -> McpResult<Vec<ResourceContents>> {
        match self {
            BuiltResource::Static(r) => r.read(ctx).await,
            BuiltResource::Dynamic(r) => r.read(ctx).await,
        }
    }

    fn to_resource(&self) -> Resource {
        match self {
            BuiltResource::Static(r) => r.to_resource(),
            BuiltResource::Dynamic(r) => r.to_resource(),
        }
    }
}

/// Builder for resources. Literal data classifies as static; a producer
/// classifies as dynamic.
pub struct ResourceBuilder {
    uri: String,
    name: String,
    description: Option<String>,
    mime_type: Option<String>,
    data: Option<Value>,
    producer: Option<tern_mcp_server::resource::ResourceHandlerFn>,
}

impl ResourceBuilder {
    pub fn new(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            description: None,
            mime_type: None,
            data: None,
            producer: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Literal data (static form): every read is byte-identical
    pub fn static_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Producer (dynamic form): runs once per read
    pub fn producer<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<Value>> + Send + 'static,
    {
        self.producer = Some(Box::new(move |ctx| Box::pin(f(ctx))));
        self
    }

    /// Build and classify
    pub fn build(self) -> McpResult<BuiltResource> {
        match (self.data, self.producer) {
            (Some(data), None) => {
                let mut resource = StaticResource::new(self.uri, self.name, data);
                if let Some(description) = self.description {
                    resource = resource.with_description(description);
                }
                if let Some(mime_type) = self.mime_type {
                    resource = resource.with_mime_type(mime_type);
                }
                Ok(BuiltResource::Static(resource))
            }
            (None, Some(producer)) => {
                let mut resource = FnResource::from_boxed(self.uri, self.name, producer);
                if let Some(description) = self.description {
                    resource = resource.with_description(description);
                }
                if let Some(mime_type) = self.mime_type {
                    resource = resource.with_mime_type(mime_type);
                }
                Ok(BuiltResource::Dynamic(resource))
            }
            (Some(_), Some(_)) => Err(McpError::configuration(format!(
                "resource '{}' declares both literal data and a producer",
                self.uri
            ))),
            (None, None) => Err(McpError::configuration(format!(
                "resource '{}' needs literal data or a producer",
                self.uri
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_static_resource() {
        let resource = ResourceBuilder::new("config://app", "App config")
            .description("Application settings")
            .static_data(json!({"retries": 3}))
            .build()
            .unwrap();
        assert!(resource.is_static());
        let contents = resource.read(RequestContext::new("t")).await.unwrap();
        assert_eq!(contents.len(), 1);
    }

    #[tokio::test]
    async fn test_dynamic_resource() {
        let resource = ResourceBuilder::new("stats://live", "Live stats")
            .producer(|_ctx| async { Ok(json!({"n": 1})) })
            .build()
            .unwrap();
        assert!(!resource.is_static());
    }

    #[test]
    fn test_neither_form_rejected() {
        assert!(ResourceBuilder::new("x://y", "y").build().is_err());
    }
}
