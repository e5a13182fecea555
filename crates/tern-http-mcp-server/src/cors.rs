//! CORS header support, permissive by default for local development

use hyper::HeaderMap;

/// Apply permissive CORS headers to a response
pub fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("Access-Control-Allow-Origin", "*".parse().unwrap());
    headers.insert(
        "Access-Control-Allow-Methods",
        "GET, POST, DELETE, OPTIONS".parse().unwrap(),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        "Content-Type, Accept, Authorization, Mcp-Session-Id, MCP-Protocol-Version"
            .parse()
            .unwrap(),
    );
    headers.insert(
        "Access-Control-Expose-Headers",
        "Mcp-Session-Id".parse().unwrap(),
    );
    headers.insert("Access-Control-Max-Age", "86400".parse().unwrap());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permissive_headers() {
        let mut headers = HeaderMap::new();
        apply_cors_headers(&mut headers);
        assert_eq!(headers.get("Access-Control-Allow-Origin").unwrap(), "*");
        assert!(
            headers
                .get("Access-Control-Allow-Headers")
                .unwrap()
                .to_str()
                .unwrap()
                .contains("Mcp-Session-Id")
        );
    }
}
