//! Argument completion types (`completions/complete`)

use serde::{Deserialize, Serialize};

/// What the completion is anchored to: a prompt name or a resource URI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CompletionReference {
    #[serde(rename = "ref/prompt")]
    Prompt { name: String },
    #[serde(rename = "ref/resource")]
    Resource { uri: String },
}

/// The argument being completed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionArgument {
    pub name: String,
    pub value: String,
}

/// `completions/complete` request parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    #[serde(rename = "ref")]
    pub reference: CompletionReference,
    pub argument: CompletionArgument,
}

/// Completion values, capped at 100 entries per the MCP spec
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_more: Option<bool>,
}

impl Completion {
    pub fn new(values: Vec<String>) -> Self {
        let total = values.len() as u64;
        Self {
            values,
            total: Some(total),
            has_more: Some(false),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

/// `completions/complete` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteResult {
    pub completion: Completion,
}

impl CompleteResult {
    pub fn new(completion: Completion) -> Self {
        Self { completion }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_tags() {
        let wire = serde_json::to_value(CompletionReference::Prompt {
            name: "weather_report".to_string(),
        })
        .unwrap();
        assert_eq!(wire["type"], "ref/prompt");
    }

    #[test]
    fn test_empty_completion() {
        let wire = serde_json::to_value(CompleteResult::new(Completion::empty())).unwrap();
        assert_eq!(wire["completion"]["values"].as_array().unwrap().len(), 0);
        assert_eq!(wire["completion"]["hasMore"], false);
    }
}
