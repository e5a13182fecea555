//! Content normalization
//!
//! Handlers return whatever is natural; the normalizer turns it into an MCP
//! content array. The input is a closed sum type so every case is handled
//! exhaustively: text, structured JSON, prebuilt envelopes, raw bytes, and
//! file handles.

use std::path::{Path, PathBuf};

use serde_json::Value;

use tern_mcp_protocol::content::{ContentBlock, ResourceContents};
use tern_mcp_protocol::{McpError, McpResult};

use crate::assets;

/// Everything a tool handler may return
pub enum ToolOutput {
    /// Plain text, passed through as a single text item
    Text(String),
    /// Structured JSON; serialized as two-space-indented text unless it is
    /// already a content envelope (or a `{type:"file", path}` handle)
    Json(Value),
    /// A prebuilt content item, validated and passed through
    Content(ContentBlock),
    /// Prebuilt content items, validated and passed through
    ContentList(Vec<ContentBlock>),
    /// Raw bytes with an optional MIME override
    Binary {
        data: Vec<u8>,
        mime_type: Option<String>,
    },
    /// A file on disk, read subject to base-path jailing and size caps
    File { path: PathBuf },
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        ToolOutput::Text(text.into())
    }

    pub fn json(value: Value) -> Self {
        ToolOutput::Json(value)
    }

    pub fn binary(data: Vec<u8>) -> Self {
        ToolOutput::Binary {
            data,
            mime_type: None,
        }
    }

    pub fn binary_with_mime(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        ToolOutput::Binary {
            data,
            mime_type: Some(mime_type.into()),
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        ToolOutput::File { path: path.into() }
    }
}

impl From<String> for ToolOutput {
    fn from(s: String) -> Self {
        ToolOutput::Text(s)
    }
}

impl From<&str> for ToolOutput {
    fn from(s: &str) -> Self {
        ToolOutput::Text(s.to_string())
    }
}

impl From<Value> for ToolOutput {
    fn from(value: Value) -> Self {
        ToolOutput::Json(value)
    }
}

impl From<ContentBlock> for ToolOutput {
    fn from(block: ContentBlock) -> Self {
        ToolOutput::Content(block)
    }
}

impl From<Vec<ContentBlock>> for ToolOutput {
    fn from(blocks: Vec<ContentBlock>) -> Self {
        ToolOutput::ContentList(blocks)
    }
}

impl From<Vec<u8>> for ToolOutput {
    fn from(data: Vec<u8>) -> Self {
        ToolOutput::binary(data)
    }
}

/// Normalize a handler's output into an MCP content array.
///
/// `base_path` jails file handles; reads outside it fail with path-escape.
pub async fn normalize(output: ToolOutput, base_path: &Path) -> McpResult<Vec<ContentBlock>> {
    match output {
        ToolOutput::Text(text) => Ok(vec![ContentBlock::text(text)]),
        ToolOutput::Json(value) => normalize_json(value, base_path).await,
        ToolOutput::Content(block) => Ok(vec![validate_block(block)?]),
        ToolOutput::ContentList(blocks) => {
            blocks.into_iter().map(validate_block).collect()
        }
        ToolOutput::Binary { data, mime_type } => {
            Ok(vec![binary_block(&data, mime_type.as_deref(), None)?])
        }
        ToolOutput::File { path } => normalize_file(&path, base_path).await,
    }
}

async fn normalize_json(value: Value, base_path: &Path) -> McpResult<Vec<ContentBlock>> {
    // A `{type: "file", path}` pseudo-handle reads from disk
    if let Some(path) = file_handle_path(&value) {
        return normalize_file(Path::new(&path), base_path).await;
    }

    // Already an MCP content envelope (or an array of them)? Pass through.
    if looks_like_envelope(&value) {
        if let Ok(block) = serde_json::from_value::<ContentBlock>(value.clone()) {
            return Ok(vec![validate_block(block)?]);
        }
    }
    if let Value::Array(items) = &value {
        if !items.is_empty() && items.iter().all(looks_like_envelope) {
            if let Ok(blocks) = serde_json::from_value::<Vec<ContentBlock>>(value.clone()) {
                return blocks.into_iter().map(validate_block).collect();
            }
        }
    }

    // Plain structured value: stable two-space JSON text
    let text = serde_json::to_string_pretty(&value)
        .map_err(|e| McpError::tool_execution(e.to_string()))?;
    Ok(vec![ContentBlock::text(text)])
}

async fn normalize_file(path: &Path, base_path: &Path) -> McpResult<Vec<ContentBlock>> {
    let (resolved, data) = assets::read_file_checked(base_path, path).await?;
    let name = resolved.display().to_string();
    let mime = assets::detect_file_mime(&name, &data, None, false);
    Ok(vec![binary_block(&data, Some(&mime), Some(&name))?])
}

/// Wrap bytes as the right kind of content block for their MIME
fn binary_block(data: &[u8], mime_type: Option<&str>, name: Option<&str>) -> McpResult<ContentBlock> {
    assets::check_size(data.len() as u64, name.unwrap_or("buffer"))?;
    let mime = match mime_type {
        Some(mime) => mime.to_string(),
        None => assets::detect_buffer_mime(data, None),
    };
    let encoded = assets::to_base64(data);
    if mime.starts_with("image/") {
        Ok(ContentBlock::image(encoded, mime))
    } else if mime.starts_with("audio/") {
        Ok(ContentBlock::audio(encoded, mime))
    } else {
        let uri = name
            .map(|n| format!("file://{}", n))
            .unwrap_or_else(|| "memory://binary".to_string());
        Ok(ContentBlock::resource(ResourceContents::blob(
            uri, encoded, mime,
        )))
    }
}

/// Validate pass-through envelopes: base64 payloads are checked against the
/// permissive shape and re-encoded canonically.
fn validate_block(block: ContentBlock) -> McpResult<ContentBlock> {
    match block {
        ContentBlock::Image { data, mime_type } => Ok(ContentBlock::Image {
            data: assets::canonicalize_base64(&data)?,
            mime_type,
        }),
        ContentBlock::Audio { data, mime_type } => Ok(ContentBlock::Audio {
            data: assets::canonicalize_base64(&data)?,
            mime_type,
        }),
        other => Ok(other),
    }
}

fn looks_like_envelope(value: &Value) -> bool {
    value
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(|t| matches!(t, "text" | "image" | "audio" | "resource"))
}

fn file_handle_path(value: &Value) -> Option<String> {
    let obj = value.as_object()?;
    if obj.get("type")?.as_str()? != "file" {
        return None;
    }
    obj.get("path")?.as_str().map(str::to_string)
}
