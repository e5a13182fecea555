//! Server-initiated notification envelopes

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use tern_mcp_json_rpc_server::JsonRpcNotification;

/// `notifications/resources/updated` parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceUpdatedParams {
    pub uri: String,
}

/// `notifications/message` (log forwarding) parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingMessageParams {
    pub level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,
    pub data: Value,
}

/// `notifications/progress` parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressParams {
    pub progress_token: Value,
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
}

/// Build a `notifications/resources/updated` notification
pub fn resource_updated(uri: impl Into<String>) -> JsonRpcNotification {
    JsonRpcNotification::new("notifications/resources/updated").with_params(HashMap::from([(
        "uri".to_string(),
        Value::String(uri.into()),
    )]))
}

/// Build a `notifications/message` notification
pub fn log_message(level: &str, data: Value) -> JsonRpcNotification {
    JsonRpcNotification::new("notifications/message").with_params(HashMap::from([
        ("level".to_string(), Value::String(level.to_string())),
        ("data".to_string(), data),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_updated_shape() {
        let note = resource_updated("stats://search");
        let wire = serde_json::to_value(&note).unwrap();
        assert_eq!(wire["method"], "notifications/resources/updated");
        assert_eq!(wire["params"]["uri"], "stats://search");
    }
}
