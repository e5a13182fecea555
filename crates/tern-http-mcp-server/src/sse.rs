//! Server-Sent Events framing

use serde_json::Value;

/// Format one JSON payload as an SSE message event
pub fn format_sse_data(data: &Value) -> String {
    format!(
        "event: message\ndata: {}\n\n",
        serde_json::to_string(data).unwrap_or_else(|_| "{}".to_string())
    )
}

/// The keep-alive comment frame (no event line, per the SSE spec)
pub fn keep_alive_frame() -> &'static str {
    ": keepalive\n\n"
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_data_frame_shape() {
        let frame = format_sse_data(&json!({"method": "notifications/message"}));
        assert!(frame.starts_with("event: message\ndata: "));
        assert!(frame.ends_with("\n\n"));
    }

    #[test]
    fn test_keepalive_is_comment() {
        assert!(keep_alive_frame().starts_with(':'));
    }
}
