use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::gateway::GatewayError;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";

/// Credential keys, checked in order.
pub const API_KEY_VARS: &[&str] = &[
    "INSTANTART_API_KEY",
    "GEMINI_API_KEY",
    "GOOGLE_API_KEY",
    "API_KEY",
];

/// Opaque credential. Formatting never reveals the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub api_key: Option<Secret>,
    pub api_base: String,
    pub model: String,
    pub relay_url: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            relay_url: None,
        }
    }
}

impl GatewayConfig {
    /// Builds a config from a key lookup; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();
        Self {
            api_key: API_KEY_VARS.iter().find_map(|key| get(*key)).map(Secret::new),
            api_base: get("GEMINI_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
            model: get("INSTANTART_MODEL").unwrap_or(defaults.model),
            relay_url: get("INSTANTART_RELAY_URL"),
        }
    }

    /// Process environment first, then the given dotenv values.
    pub fn from_env(dotenv: &HashMap<String, String>) -> Self {
        Self::from_lookup(|key| {
            std::env::var(key)
                .ok()
                .filter(|value| !value.trim().is_empty())
                .or_else(|| dotenv.get(key).cloned())
        })
    }

    pub fn require_api_key(&self) -> Result<&Secret, GatewayError> {
        self.api_key.as_ref().ok_or(GatewayError::MissingCredential)
    }
}

pub fn load_dotenv(path: &Path) -> HashMap<String, String> {
    let content = std::fs::read_to_string(path).unwrap_or_default();
    parse_dotenv(&content)
}

pub fn parse_dotenv(content: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    for raw_line in content.lines() {
        let mut line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(stripped) = line.strip_prefix("export ") {
            line = stripped.trim();
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let mut value = value.trim().to_string();
        if value.len() >= 2 {
            let bytes = value.as_bytes();
            if (bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"')
                || (bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\'')
            {
                value = value[1..value.len() - 1].to_string();
            }
        }
        vars.insert(key.to_string(), value);
    }
    vars
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{parse_dotenv, GatewayConfig, Secret, DEFAULT_MODEL};

    #[test]
    fn dotenv_handles_comments_exports_and_quotes() {
        let vars = parse_dotenv(
            "# comment\nexport GEMINI_API_KEY=\"abc 123\"\nINSTANTART_MODEL='m-1'\n\nBROKEN\n=novalue\n",
        );
        assert_eq!(vars.get("GEMINI_API_KEY").map(String::as_str), Some("abc 123"));
        assert_eq!(vars.get("INSTANTART_MODEL").map(String::as_str), Some("m-1"));
        assert_eq!(vars.len(), 2);
    }

    #[test]
    fn lookup_prefers_first_credential_key_and_skips_blanks() {
        let vars: HashMap<&str, &str> = [
            ("INSTANTART_API_KEY", "  "),
            ("GEMINI_API_KEY", "gemini-key"),
            ("API_KEY", "generic-key"),
            ("GEMINI_API_BASE", "https://example.test/v1/"),
        ]
        .into_iter()
        .collect();
        let config = GatewayConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.api_key, Some(Secret::new("gemini-key")));
        assert_eq!(config.api_base, "https://example.test/v1");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.relay_url, None);
    }

    #[test]
    fn missing_key_is_reported_at_point_of_use() {
        let config = GatewayConfig::from_lookup(|_| None);
        assert!(config.require_api_key().is_err());
    }

    #[test]
    fn secret_is_never_formatted() {
        let config = GatewayConfig {
            api_key: Some(Secret::new("sk-very-secret")),
            ..GatewayConfig::default()
        };
        let rendered = format!("{config:?} {}", Secret::new("sk-very-secret"));
        assert!(!rendered.contains("sk-very-secret"));
    }
}
