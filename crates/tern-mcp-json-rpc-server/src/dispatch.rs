//! Method dispatch: route requests to handlers, convert domain errors
//!
//! Handlers return domain errors only; the dispatcher owns the conversion to
//! JSON-RPC protocol errors via [`RpcConvert`]. Unknown methods answer
//! -32601, and handler errors raised by notifications are logged by the
//! caller and otherwise dropped (notifications are never answered).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{JsonRpcError, JsonRpcErrorObject};
use crate::request::{JsonRpcRequest, RequestParams};
use crate::response::JsonRpcMessage;

/// Minimal session context threaded through to handlers.
///
/// Transports fill in the session identifier; richer per-request state lives
/// in the consuming crate.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    /// Opaque session identifier
    pub session_id: String,
    /// Transport-supplied metadata (headers, peer info)
    pub metadata: HashMap<String, Value>,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            metadata: HashMap::new(),
        }
    }
}

/// Conversion from a domain error into a protocol error object
pub trait RpcConvert {
    fn to_error_object(&self) -> JsonRpcErrorObject;
}

/// Trait for handling JSON-RPC method calls.
///
/// Implementations return domain errors; they never construct protocol
/// errors themselves.
#[async_trait]
pub trait JsonRpcHandler: Send + Sync {
    type Error: std::error::Error + RpcConvert + Send + Sync + 'static;

    /// Handle a method call and produce the raw result value
    async fn handle(
        &self,
        method: &str,
        params: Option<RequestParams>,
        session: Option<SessionContext>,
    ) -> Result<Value, Self::Error>;

    /// Handle a notification (default: ignore)
    async fn handle_notification(
        &self,
        method: &str,
        params: Option<RequestParams>,
        session: Option<SessionContext>,
    ) -> Result<(), Self::Error> {
        let _ = (method, params, session);
        Ok(())
    }

    /// Methods this handler serves, for registration introspection
    fn supported_methods(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Routes method names to registered handlers
pub struct JsonRpcDispatcher<E>
where
    E: std::error::Error + RpcConvert + Send + Sync + 'static,
{
    handlers: HashMap<String, Arc<dyn JsonRpcHandler<Error = E>>>,
    default_handler: Option<Arc<dyn JsonRpcHandler<Error = E>>>,
}

impl<E> JsonRpcDispatcher<E>
where
    E: std::error::Error + RpcConvert + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            default_handler: None,
        }
    }

    /// Register a handler for every method it reports
    pub fn register<H>(&mut self, handler: H)
    where
        H: JsonRpcHandler<Error = E> + 'static,
    {
        let handler = Arc::new(handler);
        for method in handler.supported_methods() {
            self.handlers.insert(method, handler.clone());
        }
    }

    /// Register a handler for an explicit method list
    pub fn register_methods<H>(&mut self, methods: Vec<String>, handler: H)
    where
        H: JsonRpcHandler<Error = E> + 'static,
    {
        let handler = Arc::new(handler);
        for method in methods {
            self.handlers.insert(method, handler.clone());
        }
    }

    /// Set the fallback handler for methods with no registration
    pub fn set_default_handler<H>(&mut self, handler: H)
    where
        H: JsonRpcHandler<Error = E> + 'static,
    {
        self.default_handler = Some(Arc::new(handler));
    }

    fn resolve(&self, method: &str) -> Option<&Arc<dyn JsonRpcHandler<Error = E>>> {
        self.handlers.get(method).or(self.default_handler.as_ref())
    }

    /// Dispatch one request and produce the wire message for it
    pub async fn dispatch(
        &self,
        request: JsonRpcRequest,
        session: Option<SessionContext>,
    ) -> JsonRpcMessage {
        let Some(handler) = self.resolve(&request.method) else {
            return JsonRpcMessage::error(JsonRpcError::method_not_found(
                request.id,
                &request.method,
            ));
        };

        match handler.handle(&request.method, request.params, session).await {
            Ok(result) => JsonRpcMessage::success(request.id, result),
            Err(err) => JsonRpcMessage::error(JsonRpcError::new(
                Some(request.id),
                err.to_error_object(),
            )),
        }
    }

    /// Dispatch one notification; errors are returned for the caller to log
    pub async fn dispatch_notification(
        &self,
        method: &str,
        params: Option<RequestParams>,
        session: Option<SessionContext>,
    ) -> Result<(), E> {
        match self.resolve(method) {
            Some(handler) => handler.handle_notification(method, params, session).await,
            None => Ok(()),
        }
    }

    /// All registered method names
    pub fn methods(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }
}

impl<E> Default for JsonRpcDispatcher<E>
where
    E: std::error::Error + RpcConvert + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RequestId;
    use serde_json::json;

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error("boom: {0}")]
        Boom(String),
    }

    impl RpcConvert for TestError {
        fn to_error_object(&self) -> JsonRpcErrorObject {
            JsonRpcErrorObject::internal_error(self.to_string())
        }
    }

    struct EchoHandler;

    #[async_trait]
    impl JsonRpcHandler for EchoHandler {
        type Error = TestError;

        async fn handle(
            &self,
            method: &str,
            params: Option<RequestParams>,
            _session: Option<SessionContext>,
        ) -> Result<Value, TestError> {
            match method {
                "echo" => Ok(params.map(|p| p.to_value()).unwrap_or(Value::Null)),
                other => Err(TestError::Boom(other.to_string())),
            }
        }

        fn supported_methods(&self) -> Vec<String> {
            vec!["echo".to_string(), "fail".to_string()]
        }
    }

    #[tokio::test]
    async fn test_dispatch_success() {
        let mut dispatcher = JsonRpcDispatcher::new();
        dispatcher.register(EchoHandler);

        let req = JsonRpcRequest::new(1, "echo")
            .with_params(std::collections::HashMap::from([(
                "x".to_string(),
                json!(1),
            )]));
        let msg = dispatcher.dispatch(req, None).await;
        let JsonRpcMessage::Response(resp) = msg else {
            panic!("expected success");
        };
        assert_eq!(resp.result["x"], 1);
    }

    #[tokio::test]
    async fn test_dispatch_unknown_method() {
        let dispatcher: JsonRpcDispatcher<TestError> = JsonRpcDispatcher::new();
        let msg = dispatcher
            .dispatch(JsonRpcRequest::new(2, "nope"), None)
            .await;
        let JsonRpcMessage::Error(err) = msg else {
            panic!("expected error");
        };
        assert_eq!(err.error.code, -32601);
        assert_eq!(err.id, Some(RequestId::Number(2)));
    }

    #[tokio::test]
    async fn test_domain_error_converted() {
        let mut dispatcher = JsonRpcDispatcher::new();
        dispatcher.register(EchoHandler);
        let msg = dispatcher
            .dispatch(JsonRpcRequest::new(3, "fail"), None)
            .await;
        let JsonRpcMessage::Error(err) = msg else {
            panic!("expected error");
        };
        assert_eq!(err.error.code, -32603);
        assert!(err.error.message.contains("boom"));
    }
}
