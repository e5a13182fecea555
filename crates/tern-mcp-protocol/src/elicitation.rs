//! Elicitation types (`elicitation/create`, server-initiated)
//!
//! The server asks the connected client to collect structured input from
//! the user. The requested shape is restricted to a flat object of
//! primitive fields per the 2025-06-18 specification.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::JsonSchema;

/// `elicitation/create` request parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElicitRequest {
    /// Message shown to the user
    pub message: String,
    /// Flat object schema describing the requested fields
    pub requested_schema: JsonSchema,
}

impl ElicitRequest {
    pub fn new(message: impl Into<String>, requested_schema: JsonSchema) -> Self {
        Self {
            message: message.into(),
            requested_schema,
        }
    }
}

/// How the user responded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElicitAction {
    Accept,
    Decline,
    Cancel,
}

/// `elicitation/create` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElicitResult {
    pub action: ElicitAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<HashMap<String, Value>>,
}

impl ElicitResult {
    pub fn accepted(content: HashMap<String, Value>) -> Self {
        Self {
            action: ElicitAction::Accept,
            content: Some(content),
        }
    }

    pub fn declined() -> Self {
        Self {
            action: ElicitAction::Decline,
            content: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elicit_roundtrip() {
        let result = ElicitResult::accepted(HashMap::from([(
            "email".to_string(),
            serde_json::json!("a@b.com"),
        )]));
        let wire = serde_json::to_value(&result).unwrap();
        assert_eq!(wire["action"], "accept");
        assert_eq!(wire["content"]["email"], "a@b.com");
    }
}
