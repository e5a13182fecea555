//! MCP protocol version negotiation

use serde::{Deserialize, Serialize};

/// Known MCP protocol versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum McpVersion {
    #[serde(rename = "2024-11-05")]
    V2024_11_05,
    #[serde(rename = "2025-03-26")]
    V2025_03_26,
    #[default]
    #[serde(rename = "2025-06-18")]
    V2025_06_18,
}

impl McpVersion {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "2024-11-05" => Some(Self::V2024_11_05),
            "2025-03-26" => Some(Self::V2025_03_26),
            "2025-06-18" => Some(Self::V2025_06_18),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V2024_11_05 => "2024-11-05",
            Self::V2025_03_26 => "2025-03-26",
            Self::V2025_06_18 => "2025-06-18",
        }
    }

    /// Streamable HTTP arrived in 2025-03-26
    pub fn supports_streamable_http(&self) -> bool {
        *self >= Self::V2025_03_26
    }
}

impl std::fmt::Display for McpVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        assert_eq!(McpVersion::parse("2025-06-18"), Some(McpVersion::V2025_06_18));
        assert_eq!(McpVersion::parse("1999-01-01"), None);
        assert_eq!(McpVersion::default().as_str(), "2025-06-18");
    }

    #[test]
    fn test_streamable_support() {
        assert!(!McpVersion::V2024_11_05.supports_streamable_http());
        assert!(McpVersion::V2025_06_18.supports_streamable_http());
    }
}
