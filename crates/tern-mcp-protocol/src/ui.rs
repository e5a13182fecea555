//! UI resource envelope types
//!
//! UI resources are addressed under the `ui://` scheme and delivered as
//! resource contents whose MIME type encodes the delivery mode: a URI list
//! for external pages, HTML for everything renderable, and the remote-DOM
//! JSON MIME for serialized component trees.

use serde::{Deserialize, Serialize};

use crate::content::ResourceContents;

/// Required URI scheme prefix for UI resources
pub const UI_URI_PREFIX: &str = "ui://";

/// MIME for external URL delivery
pub const MIME_URI_LIST: &str = "text/uri-list";
/// MIME for HTML delivery (inline, file, component, folder)
pub const MIME_HTML: &str = "text/html";
/// MIME for remote-DOM payload delivery
pub const MIME_REMOTE_DOM: &str = "application/vnd.mcp-ui.remote-dom+json";

/// The six delivery modes a UI source string can classify into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UiSourceMode {
    ExternalUrl,
    InlineHtml,
    RemoteDom,
    HtmlFile,
    ComponentFile,
    Folder,
}

impl UiSourceMode {
    /// The MIME envelope each mode is delivered with
    pub fn mime_type(&self) -> &'static str {
        match self {
            UiSourceMode::ExternalUrl => MIME_URI_LIST,
            UiSourceMode::RemoteDom => MIME_REMOTE_DOM,
            UiSourceMode::InlineHtml
            | UiSourceMode::HtmlFile
            | UiSourceMode::ComponentFile
            | UiSourceMode::Folder => MIME_HTML,
        }
    }
}

/// Preferred render size, in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiSize {
    pub width: u32,
    pub height: u32,
}

/// A UI resource descriptor as advertised by `resources/list`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiResource {
    pub uri: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Tool names this UI may invoke over the client's postMessage bridge
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tools: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<UiSize>,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl UiResource {
    pub fn new(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            description: None,
            tools: Vec::new(),
            size: None,
            mime_type: None,
        }
    }
}

/// Compiled UI contents ready for `resources/read`
#[derive(Debug, Clone)]
pub struct UiResourceContents {
    pub mode: UiSourceMode,
    pub contents: ResourceContents,
}

impl UiResourceContents {
    pub fn new(uri: &str, mode: UiSourceMode, body: String) -> Self {
        Self {
            mode,
            contents: ResourceContents::text_with_mime(uri, body, mode.mime_type()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_mime_table() {
        assert_eq!(UiSourceMode::ExternalUrl.mime_type(), "text/uri-list");
        assert_eq!(UiSourceMode::InlineHtml.mime_type(), "text/html");
        assert_eq!(
            UiSourceMode::RemoteDom.mime_type(),
            "application/vnd.mcp-ui.remote-dom+json"
        );
        assert_eq!(UiSourceMode::HtmlFile.mime_type(), "text/html");
        assert_eq!(UiSourceMode::ComponentFile.mime_type(), "text/html");
        assert_eq!(UiSourceMode::Folder.mime_type(), "text/html");
    }

    #[test]
    fn test_compiled_contents_carry_mode_mime() {
        let compiled = UiResourceContents::new(
            "ui://calculator",
            UiSourceMode::InlineHtml,
            "<div>hi</div>".to_string(),
        );
        assert_eq!(compiled.contents.mime_type(), Some("text/html"));
    }
}
