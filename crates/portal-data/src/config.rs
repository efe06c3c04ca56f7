//! Remote source configuration
//!
//! Supplies the default settings attached to every remote request: JSON:API
//! content negotiation headers, the bearer token and the request timeout.

use serde_json::{json, Map, Value};

/// JSON:API media type
pub const JSONAPI_MEDIA_TYPE: &str = "application/vnd.api+json";

/// Configuration for the portal's remote JSON:API source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Scheme and authority of the API (e.g., "https://portal.example.org")
    pub host: String,
    /// Path prefix of the API (default: "api")
    pub namespace: String,
    /// Per-request timeout in milliseconds
    pub timeout_ms: Option<u64>,
    /// Bearer token sent in the `Authorization` header
    pub access_token: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            namespace: "api".to_string(),
            timeout_ms: None,
            access_token: None,
        }
    }
}

impl StoreConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Set custom namespace
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - PORTAL_API_HOST (optional, default: "" for same-origin requests)
    /// - PORTAL_API_NAMESPACE (optional, default: "api")
    /// - PORTAL_REQUEST_TIMEOUT_MS (optional)
    /// - PORTAL_ACCESS_TOKEN (optional)
    pub fn from_env() -> Result<Self, String> {
        let host = std::env::var("PORTAL_API_HOST").unwrap_or_default();
        let namespace =
            std::env::var("PORTAL_API_NAMESPACE").unwrap_or_else(|_| "api".to_string());
        let timeout_ms = match std::env::var("PORTAL_REQUEST_TIMEOUT_MS") {
            Ok(raw) => Some(
                raw.parse::<u64>()
                    .map_err(|_| format!("PORTAL_REQUEST_TIMEOUT_MS is not a number: {raw}"))?,
            ),
            Err(_) => None,
        };
        let access_token = std::env::var("PORTAL_ACCESS_TOKEN")
            .ok()
            .filter(|t| !t.is_empty());

        Ok(Self {
            host,
            namespace,
            timeout_ms,
            access_token,
        })
    }

    /// `{host}/{namespace}` without a trailing slash
    pub fn base_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        let namespace = self.namespace.trim_matches('/');
        if namespace.is_empty() {
            host.to_string()
        } else {
            format!("{host}/{namespace}")
        }
    }

    /// Settings merged into every remote request
    pub fn default_source_settings(&self) -> Map<String, Value> {
        let mut headers = Map::new();
        headers.insert("Accept".into(), json!(JSONAPI_MEDIA_TYPE));
        headers.insert("Content-Type".into(), json!(JSONAPI_MEDIA_TYPE));
        if let Some(token) = &self.access_token {
            headers.insert("Authorization".into(), json!(format!("Bearer {token}")));
        }

        let mut settings = Map::new();
        settings.insert("headers".into(), Value::Object(headers));
        if let Some(timeout) = self.timeout_ms {
            settings.insert("timeout".into(), json!(timeout));
        }
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_joins_host_and_namespace() {
        let config = StoreConfig::new("https://portal.example.org/");
        assert_eq!(config.base_url(), "https://portal.example.org/api");
        assert_eq!(
            config.with_namespace("").base_url(),
            "https://portal.example.org"
        );
    }

    #[test]
    fn same_origin_base_url() {
        assert_eq!(StoreConfig::default().base_url(), "/api");
    }

    #[test]
    fn settings_carry_negotiation_headers() {
        let settings = StoreConfig::default().default_source_settings();
        assert_eq!(settings["headers"]["Accept"], JSONAPI_MEDIA_TYPE);
        assert!(settings["headers"].get("Authorization").is_none());
        assert!(settings.get("timeout").is_none());
    }

    #[test]
    fn settings_carry_token_and_timeout() {
        let settings = StoreConfig::default()
            .with_access_token("abc")
            .with_timeout_ms(5000)
            .default_source_settings();
        assert_eq!(settings["headers"]["Authorization"], "Bearer abc");
        assert_eq!(settings["timeout"], 5000);
    }
}
