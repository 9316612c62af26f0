//! Connection options.
//!
//! Immutable per-transport settings handed to the socket collaborator on
//! every connection attempt.
//!
//! # Example
//!
//! ```ignore
//! use resilient_ws::{RetryPolicy, TransportOptions};
//!
//! let options = TransportOptions::new()
//!     .with_origin("https://app.example.com")
//!     .with_header("x-client", "worker-1")
//!     .with_retry(RetryPolicy::new().with_retries(3));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::socket::close_code;

use super::RetryPolicy;

// ============================================================================
// TransportOptions
// ============================================================================

/// Options for a [`Transport`](crate::Transport).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransportOptions {
    /// Value of the `Origin` handshake header.
    pub origin: Option<String>,

    /// Requested subprotocol (`Sec-WebSocket-Protocol`).
    pub protocol: Option<String>,

    /// Extra handshake headers.
    pub headers: BTreeMap<String, String>,

    /// Per-request settings for the handshake.
    pub request_options: RequestOptions,

    /// Settings for the WebSocket client itself.
    pub client_config: ClientConfig,

    /// Backoff policy for attempts that never connected.
    pub retry: RetryPolicy,

    /// Close code the server uses to end the session for good.
    pub terminal_close_code: u16,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: None,
            protocol: None,
            headers: BTreeMap::new(),
            request_options: RequestOptions::default(),
            client_config: ClientConfig::default(),
            retry: RetryPolicy::default(),
            terminal_close_code: close_code::CLOSED_BY_SERVER,
        }
    }

    /// Parses options from a camelCase JSON document.
    ///
    /// Missing fields take their default values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if the document is malformed
    /// and [`Error::Config`](crate::Error::Config) if the retry policy is invalid.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the retry policy is
    /// invalid.
    pub fn validate(&self) -> Result<()> {
        self.retry.validate()
    }
}

// ============================================================================
// TransportOptions Builder Methods
// ============================================================================

impl TransportOptions {
    /// Sets the `Origin` header.
    #[inline]
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Sets the requested subprotocol.
    #[inline]
    #[must_use]
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    /// Adds a handshake header, replacing any previous value for `name`.
    #[inline]
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the request options.
    #[inline]
    #[must_use]
    pub fn with_request_options(mut self, request_options: RequestOptions) -> Self {
        self.request_options = request_options;
        self
    }

    /// Sets the client configuration.
    #[inline]
    #[must_use]
    pub fn with_client_config(mut self, client_config: ClientConfig) -> Self {
        self.client_config = client_config;
        self
    }

    /// Sets the retry policy.
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the close code treated as a deliberate, final server close.
    #[inline]
    #[must_use]
    pub fn with_terminal_close_code(mut self, code: u16) -> Self {
        self.terminal_close_code = code;
        self
    }
}

// ============================================================================
// RequestOptions
// ============================================================================

/// Settings applied to the opening handshake request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestOptions {
    /// Upper bound on TCP connect plus WebSocket handshake.
    #[serde(with = "super::millis_opt")]
    pub connect_timeout: Option<Duration>,
}

impl RequestOptions {
    /// Sets the handshake timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }
}

// ============================================================================
// ClientConfig
// ============================================================================

/// WebSocket client settings.
///
/// `None` keeps the WebSocket library's default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    /// Largest accepted message in bytes.
    pub max_message_size: Option<usize>,

    /// Largest accepted frame in bytes.
    pub max_frame_size: Option<usize>,

    /// Sets `TCP_NODELAY` on the underlying stream.
    pub disable_nagle: bool,
}

impl ClientConfig {
    /// Sets the maximum message size.
    #[inline]
    #[must_use]
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = Some(size);
        self
    }

    /// Sets the maximum frame size.
    #[inline]
    #[must_use]
    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = Some(size);
        self
    }

    /// Disables Nagle's algorithm.
    #[inline]
    #[must_use]
    pub fn with_disable_nagle(mut self) -> Self {
        self.disable_nagle = true;
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = TransportOptions::default();
        assert!(options.origin.is_none());
        assert!(options.headers.is_empty());
        assert_eq!(options.terminal_close_code, 4000);
        assert_eq!(options.retry, RetryPolicy::default());
        assert!(options.request_options.connect_timeout.is_none());
    }

    #[test]
    fn test_builder_chain() {
        let options = TransportOptions::new()
            .with_origin("https://example.com")
            .with_protocol("jsonrpc")
            .with_header("x-a", "1")
            .with_header("x-a", "2")
            .with_terminal_close_code(4999);

        assert_eq!(options.origin.as_deref(), Some("https://example.com"));
        assert_eq!(options.protocol.as_deref(), Some("jsonrpc"));
        assert_eq!(options.headers.get("x-a").map(String::as_str), Some("2"));
        assert_eq!(options.terminal_close_code, 4999);
    }

    #[test]
    fn test_from_json() {
        let options = TransportOptions::from_json(
            r#"{
                "origin": "https://app.example.com",
                "headers": {"authorization": "Bearer abc"},
                "requestOptions": {"connectTimeout": 5000},
                "clientConfig": {"maxMessageSize": 1048576, "disableNagle": true},
                "retry": {"retries": 4, "minTimeout": 500}
            }"#,
        )
        .expect("valid options");

        assert_eq!(options.origin.as_deref(), Some("https://app.example.com"));
        assert_eq!(options.headers.len(), 1);
        assert_eq!(
            options.request_options.connect_timeout,
            Some(Duration::from_secs(5))
        );
        assert_eq!(options.client_config.max_message_size, Some(1_048_576));
        assert!(options.client_config.disable_nagle);
        assert_eq!(options.retry.retries, 4);
        assert_eq!(options.retry.min_timeout, Duration::from_millis(500));
        assert_eq!(options.terminal_close_code, 4000);
    }

    #[test]
    fn test_from_json_rejects_invalid_retry() {
        let result = TransportOptions::from_json(r#"{"retry": {"factor": 0.1}}"#);
        assert!(matches!(result, Err(crate::Error::Config { .. })));
    }

    #[test]
    fn test_from_json_rejects_malformed() {
        let result = TransportOptions::from_json("{ not json");
        assert!(matches!(result, Err(crate::Error::Json(_))));
    }
}
