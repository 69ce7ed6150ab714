//! Per-call options for `ApiClient` methods.

use std::time::Duration;

use serde_json::Value;

/// Options for `ApiClient::get`.
#[derive(Debug, Clone, PartialEq)]
pub struct GetOptions {
    /// Consult and fill the response cache. On by default.
    pub cache: bool,
    /// TTL for this response; the client default when `None`.
    pub cache_ttl: Option<Duration>,
    pub headers: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

impl Default for GetOptions {
    fn default() -> Self {
        Self {
            cache: true,
            cache_ttl: None,
            headers: Vec::new(),
            timeout: None,
        }
    }
}

impl GetOptions {
    pub fn no_cache() -> Self {
        Self {
            cache: false,
            ..Self::default()
        }
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            cache_ttl: Some(ttl),
            ..Self::default()
        }
    }
}

/// Options for `ApiClient::request`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn with_body(body: Value) -> Self {
        Self {
            body: Some(body),
            ..Self::default()
        }
    }
}
