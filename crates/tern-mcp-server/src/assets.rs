//! Binary and filesystem asset helpers
//!
//! MIME detection (extension table plus magic bytes), canonical base64
//! encode/decode, and base-path-jailed file reads with the 50 MiB hard cap
//! and a warning above 10 MiB.

use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::warn;

use tern_mcp_protocol::{McpError, McpResult};

/// Hard cap on binary payloads
pub const MAX_CONTENT_BYTES: u64 = 50 * 1024 * 1024;
/// Payloads above this emit a warning but complete
pub const WARN_CONTENT_BYTES: u64 = 10 * 1024 * 1024;

/// Extension to MIME table
const EXTENSION_MIMES: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("svg", "image/svg+xml"),
    ("pdf", "application/pdf"),
    ("json", "application/json"),
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("css", "text/css"),
    ("js", "text/javascript"),
    ("wasm", "application/wasm"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("ogg", "audio/ogg"),
    ("mp4", "video/mp4"),
    ("bin", "application/octet-stream"),
];

/// Fallback when nothing else matches
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Look up a MIME type by file extension
pub fn mime_from_extension(path: &str) -> Option<&'static str> {
    let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
    EXTENSION_MIMES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
}

/// Sniff a MIME type from leading magic bytes
pub fn mime_from_magic(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        Some("image/webp")
    } else if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WAVE" {
        Some("audio/wav")
    } else if data.starts_with(b"%PDF-") {
        Some("application/pdf")
    } else if data.starts_with(b"PK\x03\x04") {
        Some("application/zip")
    } else if data.starts_with(b"OggS") {
        Some("audio/ogg")
    } else if data.starts_with(b"ID3") || data.starts_with(&[0xFF, 0xFB]) {
        Some("audio/mpeg")
    } else if data.starts_with(b"\0asm") {
        Some("application/wasm")
    } else {
        None
    }
}

/// MIME for a raw in-memory buffer: explicit override, then magic bytes,
/// then octet-stream.
pub fn detect_buffer_mime(data: &[u8], override_mime: Option<&str>) -> String {
    override_mime
        .map(str::to_string)
        .or_else(|| mime_from_magic(data).map(str::to_string))
        .unwrap_or_else(|| OCTET_STREAM.to_string())
}

/// MIME for a file: explicit override first; extension wins over magic
/// bytes unless the caller asks for magic priority or there is no
/// recognized extension.
pub fn detect_file_mime(
    path: &str,
    data: &[u8],
    override_mime: Option<&str>,
    magic_priority: bool,
) -> String {
    if let Some(mime) = override_mime {
        return mime.to_string();
    }
    let from_ext = mime_from_extension(path);
    let from_magic = mime_from_magic(data);
    let chosen = if magic_priority {
        from_magic.or(from_ext)
    } else {
        from_ext.or(from_magic)
    };
    chosen.unwrap_or(OCTET_STREAM).to_string()
}

/// Encode bytes as canonical (padded, unwrapped) base64
pub fn to_base64(data: &[u8]) -> String {
    BASE64.encode(data)
}

fn base64_shape() -> &'static regex::Regex {
    static SHAPE: OnceLock<regex::Regex> = OnceLock::new();
    SHAPE.get_or_init(|| regex::Regex::new(r"^[A-Za-z0-9+/\s]*={0,2}\s*$").unwrap())
}

/// Permissive base64 shape check (whitespace tolerated)
pub fn is_base64(s: &str) -> bool {
    base64_shape().is_match(s)
}

/// Decode base64, stripping a `data:*;base64,` prefix when present
pub fn from_base64(input: &str) -> McpResult<Vec<u8>> {
    let payload = match input.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(";base64,")
            .map(|(_, b64)| b64)
            .ok_or_else(|| McpError::InvalidBase64("data URL without base64 payload".into()))?,
        None => input,
    };
    if !is_base64(payload) {
        return Err(McpError::InvalidBase64(
            "input does not look like base64".into(),
        ));
    }
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    BASE64
        .decode(compact.as_bytes())
        .map_err(|e| McpError::InvalidBase64(e.to_string()))
}

/// Re-encode a base64 payload canonically, validating it on the way
pub fn canonicalize_base64(input: &str) -> McpResult<String> {
    Ok(to_base64(&from_base64(input)?))
}

/// Resolve a path against the server base path, rejecting escapes.
///
/// Normalization is lexical (`..` components resolved against the joined
/// path) so the check holds for files that do not exist yet.
pub fn resolve_in_base(base: &Path, candidate: &Path) -> McpResult<PathBuf> {
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base.join(candidate)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(McpError::PathEscape {
                        path: candidate.display().to_string(),
                    });
                }
            }
            Component::CurDir => {}
            other => normalized.push(other),
        }
    }

    if !normalized.starts_with(base) {
        return Err(McpError::PathEscape {
            path: candidate.display().to_string(),
        });
    }
    Ok(normalized)
}

/// Read a file under the base path, enforcing the size caps
pub async fn read_file_checked(base: &Path, candidate: &Path) -> McpResult<(PathBuf, Vec<u8>)> {
    let path = resolve_in_base(base, candidate)?;
    let metadata = tokio::fs::metadata(&path).await?;
    check_size(metadata.len(), &path.display().to_string())?;
    let data = tokio::fs::read(&path).await?;
    Ok((path, data))
}

/// Apply the 50 MiB hard cap and the 10 MiB warning to a known size
pub fn check_size(size: u64, label: &str) -> McpResult<()> {
    if size > MAX_CONTENT_BYTES {
        return Err(McpError::ContentTooLarge {
            size,
            limit: MAX_CONTENT_BYTES,
        });
    }
    if size > WARN_CONTENT_BYTES {
        warn!(size, label, "content exceeds 10 MiB; consider a resource link");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_table() {
        assert_eq!(mime_from_extension("chart.png"), Some("image/png"));
        assert_eq!(mime_from_extension("NOTES.MD"), Some("text/markdown"));
        assert_eq!(mime_from_extension("no_extension"), None);
    }

    #[test]
    fn test_magic_bytes() {
        assert_eq!(
            mime_from_magic(b"\x89PNG\r\n\x1a\n____"),
            Some("image/png")
        );
        assert_eq!(mime_from_magic(b"%PDF-1.7 rest"), Some("application/pdf"));
        assert_eq!(mime_from_magic(b"plain text"), None);
    }

    #[test]
    fn test_extension_wins_unless_magic_priority() {
        let png = b"\x89PNG\r\n\x1a\n____";
        // Lying extension: table entry wins by default
        assert_eq!(detect_file_mime("photo.jpg", png, None, false), "image/jpeg");
        // Magic priority flips it
        assert_eq!(detect_file_mime("photo.jpg", png, None, true), "image/png");
        // Override beats both
        assert_eq!(
            detect_file_mime("photo.jpg", png, Some("image/x-custom"), true),
            "image/x-custom"
        );
    }

    #[test]
    fn test_base64_roundtrip() {
        let data = b"hello, bytes \x00\x01\x02";
        let encoded = to_base64(data);
        assert_eq!(from_base64(&encoded).unwrap(), data);
    }

    #[test]
    fn test_base64_data_url_stripped() {
        let encoded = format!("data:image/png;base64,{}", to_base64(b"png-ish"));
        assert_eq!(from_base64(&encoded).unwrap(), b"png-ish");
    }

    #[test]
    fn test_invalid_base64_rejected() {
        assert!(matches!(
            from_base64("not!!base64"),
            Err(McpError::InvalidBase64(_))
        ));
    }

    #[test]
    fn test_canonicalize_accepts_whitespace() {
        let sloppy = "aGVs\nbG8=";
        assert_eq!(canonicalize_base64(sloppy).unwrap(), "aGVsbG8=");
    }

    #[test]
    fn test_path_escape_rejected() {
        let base = Path::new("/srv");
        let err = resolve_in_base(base, Path::new("../x.txt")).unwrap_err();
        assert!(matches!(err, McpError::PathEscape { .. }));

        let ok = resolve_in_base(base, Path::new("sub/../x.txt")).unwrap();
        assert_eq!(ok, PathBuf::from("/srv/x.txt"));
    }

    #[test]
    fn test_absolute_path_outside_base_rejected() {
        let base = Path::new("/srv");
        assert!(resolve_in_base(base, Path::new("/etc/passwd")).is_err());
        assert!(resolve_in_base(base, Path::new("/srv/ok.txt")).is_ok());
    }

    #[test]
    fn test_size_caps() {
        assert!(check_size(MAX_CONTENT_BYTES, "exact").is_ok());
        let err = check_size(MAX_CONTENT_BYTES + 1, "over").unwrap_err();
        assert!(matches!(err, McpError::ContentTooLarge { .. }));
        // 10 MiB + 1 warns but completes
        assert!(check_size(WARN_CONTENT_BYTES + 1, "warned").is_ok());
    }
}
