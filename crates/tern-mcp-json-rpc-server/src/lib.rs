//! # JSON-RPC 2.0 Server Foundation
//!
//! A pure, transport-agnostic JSON-RPC 2.0 implementation with clean
//! domain/protocol separation. Handlers return domain errors; the dispatcher
//! owns the conversion to protocol error objects.
//!
//! ## Features
//! - **JSON-RPC 2.0 compliance**: requests, notifications, batches, and the
//!   standard error-code table
//! - **Domain errors at the seam**: handlers never construct protocol errors
//! - **Transport agnostic**: the same dispatcher serves stdio and HTTP
//! - **Bidirectional aware**: incoming client replies (responses to
//!   server-initiated requests) parse alongside requests and notifications

pub mod dispatch;
pub mod error;
pub mod notification;
pub mod request;
pub mod response;
pub mod types;

pub use dispatch::{JsonRpcDispatcher, JsonRpcHandler, RpcConvert, SessionContext};
pub use error::{JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject};
pub use notification::JsonRpcNotification;
pub use request::{JsonRpcRequest, RequestParams};
pub use response::{ClientReply, JsonRpcMessage, JsonRpcResponse};
pub use types::{JsonRpcVersion, RequestId};

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// A single parsed incoming wire item
#[derive(Debug, Clone)]
pub enum IncomingItem {
    /// A request carrying an id; expects a response
    Request(JsonRpcRequest),
    /// A notification; never answered
    Notification(JsonRpcNotification),
    /// A client reply to a server-initiated request
    Reply(ClientReply),
}

/// A parsed incoming body: one item or a batch
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    Single(IncomingItem),
    Batch(Vec<IncomingItem>),
}

impl IncomingMessage {
    /// Flatten into a list of items regardless of batch framing
    pub fn into_items(self) -> Vec<IncomingItem> {
        match self {
            IncomingMessage::Single(item) => vec![item],
            IncomingMessage::Batch(items) => items,
        }
    }

    /// Whether this was a batch on the wire
    pub fn is_batch(&self) -> bool {
        matches!(self, IncomingMessage::Batch(_))
    }
}

/// Parse a raw body into incoming items.
///
/// Malformed JSON yields a parse error (-32700) with a null id. A JSON value
/// that is neither an object nor an array of objects yields an invalid
/// request error (-32600).
pub fn parse_message(body: &str) -> Result<IncomingMessage, JsonRpcError> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|_| JsonRpcError::parse_error())?;

    match value {
        serde_json::Value::Array(items) => {
            if items.is_empty() {
                return Err(JsonRpcError::invalid_request(None));
            }
            let parsed = items
                .into_iter()
                .map(parse_item)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(IncomingMessage::Batch(parsed))
        }
        other => Ok(IncomingMessage::Single(parse_item(other)?)),
    }
}

fn parse_item(value: serde_json::Value) -> Result<IncomingItem, JsonRpcError> {
    let obj = match &value {
        serde_json::Value::Object(map) => map,
        _ => return Err(JsonRpcError::invalid_request(None)),
    };

    if obj.get("jsonrpc").and_then(|v| v.as_str()) != Some(JSONRPC_VERSION) {
        return Err(JsonRpcError::invalid_request(extract_id(obj)));
    }

    if obj.contains_key("method") {
        if obj.contains_key("id") {
            serde_json::from_value(value.clone())
                .map(IncomingItem::Request)
                .map_err(|_| JsonRpcError::invalid_request(extract_id(obj)))
        } else {
            serde_json::from_value(value.clone())
                .map(IncomingItem::Notification)
                .map_err(|_| JsonRpcError::invalid_request(None))
        }
    } else if obj.contains_key("result") || obj.contains_key("error") {
        serde_json::from_value(value.clone())
            .map(IncomingItem::Reply)
            .map_err(|_| JsonRpcError::invalid_request(extract_id(obj)))
    } else {
        Err(JsonRpcError::invalid_request(extract_id(obj)))
    }
}

fn extract_id(obj: &serde_json::Map<String, serde_json::Value>) -> Option<RequestId> {
    obj.get("id")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_request() {
        let body = r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#;
        let parsed = parse_message(body).unwrap();
        let items = parsed.into_items();
        assert_eq!(items.len(), 1);
        let IncomingItem::Request(req) = &items[0] else {
            panic!("expected request, got {:?}", items[0]);
        };
        assert_eq!(req.method, "tools/list");
    }

    #[test]
    fn test_parse_notification() {
        let body = r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
        let items = parse_message(body).unwrap().into_items();
        assert!(matches!(items[0], IncomingItem::Notification(_)));
    }

    #[test]
    fn test_parse_client_reply() {
        let body = r#"{"jsonrpc":"2.0","id":"req-7","result":{"action":"accept"}}"#;
        let items = parse_message(body).unwrap().into_items();
        let IncomingItem::Reply(reply) = &items[0] else {
            panic!("expected reply");
        };
        assert_eq!(reply.id, RequestId::String("req-7".to_string()));
    }

    #[test]
    fn test_parse_batch() {
        let body = r#"[
            {"jsonrpc":"2.0","id":1,"method":"ping"},
            {"jsonrpc":"2.0","method":"notifications/initialized"}
        ]"#;
        let parsed = parse_message(body).unwrap();
        assert!(parsed.is_batch());
        assert_eq!(parsed.into_items().len(), 2);
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let err = parse_message("{not json").unwrap_err();
        assert_eq!(err.error.code, JsonRpcErrorCode::ParseError.code());
    }

    #[test]
    fn test_wrong_version_rejected() {
        let err = parse_message(r#"{"jsonrpc":"1.0","id":1,"method":"ping"}"#).unwrap_err();
        assert_eq!(err.error.code, JsonRpcErrorCode::InvalidRequest.code());
    }

    #[test]
    fn test_empty_batch_rejected() {
        let err = parse_message("[]").unwrap_err();
        assert_eq!(err.error.code, JsonRpcErrorCode::InvalidRequest.code());
    }
}
