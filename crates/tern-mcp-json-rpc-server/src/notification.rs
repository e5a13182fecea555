//! JSON-RPC notification type

use serde::{Deserialize, Serialize};

use crate::request::RequestParams;
use crate::types::JsonRpcVersion;

/// A JSON-RPC notification: a request without an id, never answered
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<RequestParams>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            version: JsonRpcVersion,
            method: method.into(),
            params: None,
        }
    }

    pub fn with_params(mut self, params: impl Into<RequestParams>) -> Self {
        self.params = Some(params.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_notification_has_no_id() {
        let note = JsonRpcNotification::new("notifications/resources/updated").with_params(
            HashMap::from([("uri".to_string(), serde_json::json!("stats://search"))]),
        );
        let wire = serde_json::to_value(&note).unwrap();
        assert!(wire.get("id").is_none());
        assert_eq!(wire["method"], "notifications/resources/updated");
    }
}
