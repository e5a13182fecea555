//! UI source classification and compilation
//!
//! A UI `source` string classifies into one of six delivery modes; the
//! compiler turns the classified source into the MCP envelope for it.
//! Component compilation shells out to an external `esbuild` binary, probed
//! at first use; its absence surfaces as a structured missing-dependency
//! error rather than a hard failure at build time. Compilation results are
//! cached by source hash.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use tern_mcp_protocol::ui::{UiResourceContents, UiSourceMode};
use tern_mcp_protocol::{McpError, McpResult};

use crate::assets;
use crate::context::RequestContext;
use crate::ui::UiEntry;

/// Compiler configuration
#[derive(Debug, Clone)]
pub struct UiCompilerConfig {
    /// Bare specifiers resolved from a CDN at runtime instead of bundled
    pub external_deps: Vec<String>,
    /// Folder assets at or under this size are inlined into the index
    pub inline_asset_limit: u64,
    /// The esbuild binary used for component compilation
    pub esbuild_path: String,
    /// CDN prefix for external dependency resolution
    pub cdn_prefix: String,
}

impl Default for UiCompilerConfig {
    fn default() -> Self {
        Self {
            external_deps: vec!["react".to_string(), "react-dom".to_string()],
            inline_asset_limit: 64 * 1024,
            esbuild_path: "esbuild".to_string(),
            cdn_prefix: "https://esm.sh/".to_string(),
        }
    }
}

/// Classify a source string into its delivery mode.
///
/// Detection is prefix-based: URL schemes first, then a leading `<`, then a
/// remote-DOM JSON object, then recognizable markup, then file extensions,
/// then directories.
pub fn classify(source: &str, base_path: &Path) -> McpResult<UiSourceMode> {
    let trimmed = source.trim();
    let lower = trimmed.to_ascii_lowercase();

    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Ok(UiSourceMode::ExternalUrl);
    }
    if trimmed.starts_with('<') {
        return Ok(UiSourceMode::InlineHtml);
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if value.get("type").is_some() {
            return Ok(UiSourceMode::RemoteDom);
        }
    }
    if looks_like_markup(&lower) {
        return Ok(UiSourceMode::InlineHtml);
    }
    if lower.ends_with(".html") || lower.ends_with(".htm") {
        return Ok(UiSourceMode::HtmlFile);
    }
    if lower.ends_with(".tsx") || lower.ends_with(".jsx") {
        return Ok(UiSourceMode::ComponentFile);
    }
    if trimmed.ends_with('/') {
        return Ok(UiSourceMode::Folder);
    }
    let candidate = base_path.join(trimmed);
    if candidate.is_dir() && candidate.join("index.html").is_file() {
        return Ok(UiSourceMode::Folder);
    }

    Err(McpError::configuration(format!(
        "UI source '{}' matches no delivery mode",
        truncate(trimmed, 80)
    )))
}

fn looks_like_markup(lower: &str) -> bool {
    ["<!doctype", "<html", "<body", "<div", "<span", "<script", "<style", "<p>", "<h1"]
        .iter()
        .any(|tag| lower.contains(tag))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

/// Compiles classified sources into delivery envelopes
pub struct UiCompiler {
    base_path: PathBuf,
    config: UiCompilerConfig,
    /// Compiled component HTML by source hash
    cache: Mutex<HashMap<u64, String>>,
}

impl UiCompiler {
    pub fn new(base_path: PathBuf, config: UiCompilerConfig) -> Self {
        Self {
            base_path,
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve, classify, and compile a UI entry's source
    pub async fn compile(&self, entry: &UiEntry, ctx: RequestContext) -> McpResult<UiResourceContents> {
        let source = entry.resolve_source(ctx).await?;
        let mode = classify(&source, &self.base_path)?;
        debug!(uri = entry.uri(), ?mode, "compiling UI source");

        let body = match mode {
            UiSourceMode::ExternalUrl => source.trim().to_string(),
            UiSourceMode::InlineHtml => with_css(source, entry.css()),
            UiSourceMode::RemoteDom => source,
            UiSourceMode::HtmlFile => {
                let (_, data) =
                    assets::read_file_checked(&self.base_path, Path::new(source.trim())).await?;
                with_css(String::from_utf8_lossy(&data).into_owned(), entry.css())
            }
            UiSourceMode::ComponentFile => self.compile_component(source.trim(), entry.css()).await?,
            UiSourceMode::Folder => self.compile_folder(source.trim()).await?,
        };

        let mut compiled = UiResourceContents::new(entry.uri(), mode, body);
        if let Some(mime) = entry.mime_override() {
            compiled.contents = match compiled.contents {
                tern_mcp_protocol::content::ResourceContents::Text(mut t) => {
                    t.mime_type = Some(mime.to_string());
                    tern_mcp_protocol::content::ResourceContents::Text(t)
                }
                other => other,
            };
        }
        Ok(compiled)
    }

    /// Compile a .tsx/.jsx component into a self-contained HTML page
    async fn compile_component(&self, rel_path: &str, css: Option<&str>) -> McpResult<String> {
        let (path, data) = assets::read_file_checked(&self.base_path, Path::new(rel_path)).await?;
        let source = String::from_utf8_lossy(&data).into_owned();

        let key = hash_source(&source);
        if let Some(cached) = self.cache.lock().unwrap().get(&key) {
            debug!(path = %path.display(), "component cache hit");
            return Ok(with_css(cached.clone(), css));
        }

        let deps = extract_bare_imports(&source);
        let externals: Vec<&String> = deps
            .iter()
            .filter(|d| self.config.external_deps.iter().any(|e| e == *d))
            .collect();

        let loader = if rel_path.ends_with(".tsx") { "tsx" } else { "jsx" };
        let compiled = self.run_esbuild(&source, loader).await?;

        let import_map: HashMap<String, String> = externals
            .iter()
            .map(|d| (d.to_string(), format!("{}{}", self.config.cdn_prefix, d)))
            .collect();
        let import_map_json = serde_json::to_string(&serde_json::json!({
            "imports": import_map
        }))
        .map_err(|e| McpError::tool_execution(e.to_string()))?;

        let page = format!(
            "<!doctype html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
             <script type=\"importmap\">{import_map_json}</script>\n</head>\n\
             <body>\n<div id=\"root\"></div>\n\
             <script type=\"module\">\n{compiled}\n</script>\n</body>\n</html>\n"
        );
        self.cache.lock().unwrap().insert(key, page.clone());
        Ok(with_css(page, css))
    }

    /// Run the external compiler; absence is a structured missing-dependency
    async fn run_esbuild(&self, source: &str, loader: &str) -> McpResult<String> {
        let spawned = Command::new(&self.config.esbuild_path)
            .arg(format!("--loader={loader}"))
            .arg("--format=esm")
            .arg("--jsx=automatic")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(McpError::MissingDependency {
                    feature: "esbuild".to_string(),
                    hint: format!(
                        "component compilation needs the '{}' binary on PATH",
                        self.config.esbuild_path
                    ),
                });
            }
            Err(err) => return Err(err.into()),
        };

        if let Some(stdin) = child.stdin.as_mut() {
            stdin.write_all(source.as_bytes()).await?;
        }
        drop(child.stdin.take());

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(McpError::tool_execution(format!(
                "component compilation failed: {}",
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Compile a folder: the index with small css/js assets inlined
    async fn compile_folder(&self, rel_path: &str) -> McpResult<String> {
        let folder_rel = rel_path.trim_end_matches('/');
        let folder = assets::resolve_in_base(&self.base_path, Path::new(folder_rel))?;
        let (_, index_data) = assets::read_file_checked(&folder, Path::new("index.html")).await?;
        let mut html = String::from_utf8_lossy(&index_data).into_owned();

        for reference in extract_asset_refs(&html) {
            let asset_path = match assets::resolve_in_base(&folder, Path::new(&reference.href)) {
                Ok(path) => path,
                Err(_) => continue,
            };
            let Ok(metadata) = tokio::fs::metadata(&asset_path).await else {
                continue;
            };
            if metadata.len() > self.config.inline_asset_limit {
                debug!(asset = %reference.href, "asset above inline limit, left referenced");
                continue;
            }
            let Ok(data) = tokio::fs::read(&asset_path).await else {
                continue;
            };
            let body = String::from_utf8_lossy(&data);
            let replacement = match reference.kind {
                AssetKind::Css => format!("<style>\n{}\n</style>", body),
                AssetKind::Js => format!("<script>\n{}\n</script>", body),
            };
            html = html.replace(&reference.tag, &replacement);
        }
        Ok(html)
    }
}

fn with_css(body: String, css: Option<&str>) -> String {
    match css {
        Some(css) if !body.contains(css) => format!("<style>\n{}\n</style>\n{}", css, body),
        _ => body,
    }
}

fn hash_source(source: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    hasher.finish()
}

/// Extract bare import specifiers (package roots) from component source
pub fn extract_bare_imports(source: &str) -> Vec<String> {
    let re = regex::Regex::new(
        r#"(?m)^\s*import\s+(?:[\w$*\s{},]+\s+from\s+)?["']([^"'./][^"']*)["']"#,
    )
    .expect("import regex");
    let mut seen = Vec::new();
    for captures in re.captures_iter(source) {
        let specifier = &captures[1];
        let root = package_root(specifier);
        if !seen.contains(&root) {
            seen.push(root);
        }
    }
    seen
}

/// `@scope/name/deep` -> `@scope/name`; `name/deep` -> `name`
fn package_root(specifier: &str) -> String {
    let mut parts = specifier.split('/');
    if specifier.starts_with('@') {
        match (parts.next(), parts.next()) {
            (Some(scope), Some(name)) => format!("{}/{}", scope, name),
            _ => specifier.to_string(),
        }
    } else {
        parts.next().unwrap_or(specifier).to_string()
    }
}

enum AssetKind {
    Css,
    Js,
}

struct AssetRef {
    tag: String,
    href: String,
    kind: AssetKind,
}

/// Find relative css/js references in the index markup
fn extract_asset_refs(html: &str) -> Vec<AssetRef> {
    let link_re =
        regex::Regex::new(r#"(?i)<link\b[^>]*href=["']([^"':]+\.css)["'][^>]*/?>"#).expect("link regex");
    let script_re =
        regex::Regex::new(r#"(?i)<script\b[^>]*src=["']([^"':]+\.js)["'][^>]*>\s*</script>"#)
            .expect("script regex");

    let mut refs = Vec::new();
    for captures in link_re.captures_iter(html) {
        refs.push(AssetRef {
            tag: captures[0].to_string(),
            href: captures[1].to_string(),
            kind: AssetKind::Css,
        });
    }
    for captures in script_re.captures_iter(html) {
        refs.push(AssetRef {
            tag: captures[0].to_string(),
            href: captures[1].to_string(),
            kind: AssetKind::Js,
        });
    }
    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::UiSource;
    use std::io::Write;

    fn base() -> PathBuf {
        std::env::temp_dir()
    }

    #[test]
    fn test_classification_table() {
        let b = base();
        assert_eq!(
            classify("https://example.com/app", &b).unwrap(),
            UiSourceMode::ExternalUrl
        );
        assert_eq!(
            classify("HTTP://example.com", &b).unwrap(),
            UiSourceMode::ExternalUrl
        );
        assert_eq!(classify("<div>hi</div>", &b).unwrap(), UiSourceMode::InlineHtml);
        assert_eq!(
            classify(r#"{"type": "stack", "children": []}"#, &b).unwrap(),
            UiSourceMode::RemoteDom
        );
        assert_eq!(classify("panel.html", &b).unwrap(), UiSourceMode::HtmlFile);
        assert_eq!(classify("widget.tsx", &b).unwrap(), UiSourceMode::ComponentFile);
        assert_eq!(classify("app.jsx", &b).unwrap(), UiSourceMode::ComponentFile);
        assert_eq!(classify("dashboard/", &b).unwrap(), UiSourceMode::Folder);
    }

    #[test]
    fn test_markup_without_leading_angle() {
        assert_eq!(
            classify("some text then <div>x</div>", &base()).unwrap(),
            UiSourceMode::InlineHtml
        );
    }

    #[test]
    fn test_json_without_type_is_not_remote_dom() {
        assert!(classify(r#"{"kind": "x"}"#, &base()).is_err());
    }

    #[test]
    fn test_folder_detected_by_index() {
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("app");
        std::fs::create_dir(&app).unwrap();
        std::fs::File::create(app.join("index.html"))
            .unwrap()
            .write_all(b"<html></html>")
            .unwrap();
        assert_eq!(classify("app", dir.path()).unwrap(), UiSourceMode::Folder);
    }

    #[test]
    fn test_bare_import_extraction() {
        let source = r#"
import React from "react";
import { useState } from 'react';
import ReactDOM from "react-dom/client";
import { helper } from "./local";
import styles from "../styles.css";
import { Chart } from "@nivo/line";
"#;
        let deps = extract_bare_imports(source);
        assert_eq!(deps, vec!["react", "react-dom", "@nivo/line"]);
    }

    #[tokio::test]
    async fn test_inline_html_compiles_verbatim() {
        let compiler = UiCompiler::new(base(), UiCompilerConfig::default());
        let entry = UiEntry::new("ui://calc", "calc", UiSource::literal("<div>calc</div>"))
            .unwrap();
        let compiled = compiler
            .compile(&entry, RequestContext::new("s"))
            .await
            .unwrap();
        assert_eq!(compiled.mode, UiSourceMode::InlineHtml);
        assert_eq!(compiled.contents.mime_type(), Some("text/html"));
    }

    #[tokio::test]
    async fn test_external_url_envelope() {
        let compiler = UiCompiler::new(base(), UiCompilerConfig::default());
        let entry = UiEntry::new(
            "ui://remote",
            "remote",
            UiSource::literal("https://example.com/panel"),
        )
        .unwrap();
        let compiled = compiler
            .compile(&entry, RequestContext::new("s"))
            .await
            .unwrap();
        assert_eq!(compiled.contents.mime_type(), Some("text/uri-list"));
    }

    #[tokio::test]
    async fn test_html_file_read_from_base() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::File::create(dir.path().join("panel.html"))
            .unwrap()
            .write_all(b"<html><body>panel</body></html>")
            .unwrap();

        let compiler = UiCompiler::new(dir.path().to_path_buf(), UiCompilerConfig::default());
        let entry = UiEntry::new("ui://panel", "panel", UiSource::literal("panel.html")).unwrap();
        let compiled = compiler
            .compile(&entry, RequestContext::new("s"))
            .await
            .unwrap();
        let tern_mcp_protocol::content::ResourceContents::Text(text) = &compiled.contents else {
            panic!("expected text contents");
        };
        assert!(text.text.contains("panel"));
    }

    #[tokio::test]
    async fn test_folder_inlines_small_assets() {
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("app");
        std::fs::create_dir(&app).unwrap();
        std::fs::File::create(app.join("index.html"))
            .unwrap()
            .write_all(
                br#"<html><head><link rel="stylesheet" href="style.css"></head><body></body></html>"#,
            )
            .unwrap();
        std::fs::File::create(app.join("style.css"))
            .unwrap()
            .write_all(b"body { margin: 0; }")
            .unwrap();

        let compiler = UiCompiler::new(dir.path().to_path_buf(), UiCompilerConfig::default());
        let entry = UiEntry::new("ui://app", "app", UiSource::literal("app/")).unwrap();
        let compiled = compiler
            .compile(&entry, RequestContext::new("s"))
            .await
            .unwrap();
        let tern_mcp_protocol::content::ResourceContents::Text(text) = &compiled.contents else {
            panic!("expected text contents");
        };
        assert!(text.text.contains("margin: 0"));
        assert!(!text.text.contains("<link"));
    }

    #[test]
    fn test_package_root() {
        assert_eq!(package_root("react-dom/client"), "react-dom");
        assert_eq!(package_root("@scope/pkg/deep/mod"), "@scope/pkg");
        assert_eq!(package_root("plain"), "plain");
    }
}
