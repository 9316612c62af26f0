//! Builder pattern for transport configuration.
//!
//! Provides a fluent API for configuring and creating [`Transport`] instances.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use resilient_ws::{RetryPolicy, Transport};
//!
//! # async fn example() -> resilient_ws::Result<()> {
//! let transport = Transport::builder("wss://api.example.com/rpc")
//!     .origin("https://app.example.com")
//!     .retry(RetryPolicy::new().with_retries(5).with_max_timeout(Duration::from_secs(30)))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use url::Url;

use crate::config::{ClientConfig, RequestOptions, RetryPolicy, TransportOptions};
use crate::error::{Error, Result};
use crate::protocol::{Codec, JsonRpcCodec};
use crate::socket::{Connector, WebSocketConnector};

use super::core::Transport;

// ============================================================================
// TransportBuilder
// ============================================================================

/// Builder for configuring a [`Transport`] instance.
///
/// Use [`Transport::builder()`] to create a new builder.
pub struct TransportBuilder<C: Codec = JsonRpcCodec> {
    /// Target address, parsed on build.
    address: String,
    /// Connection options.
    options: TransportOptions,
    /// Socket factory; WebSocket when unset.
    connector: Option<Arc<dyn Connector>>,
    /// Message codec.
    codec: C,
}

impl<C: Codec + fmt::Debug> fmt::Debug for TransportBuilder<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportBuilder")
            .field("address", &self.address)
            .field("options", &self.options)
            .field("custom_connector", &self.connector.is_some())
            .field("codec", &self.codec)
            .finish()
    }
}

// ============================================================================
// TransportBuilder Implementation
// ============================================================================

impl TransportBuilder {
    /// Creates a builder with default options and the JSON-RPC codec.
    #[inline]
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            options: TransportOptions::default(),
            connector: None,
            codec: JsonRpcCodec,
        }
    }
}

impl<C: Codec> TransportBuilder<C> {
    /// Replaces all options at once.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: TransportOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the `Origin` handshake header.
    #[inline]
    #[must_use]
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.options.origin = Some(origin.into());
        self
    }

    /// Sets the requested subprotocol.
    #[inline]
    #[must_use]
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.options.protocol = Some(protocol.into());
        self
    }

    /// Adds a handshake header.
    #[inline]
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the backoff policy.
    #[inline]
    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.options.retry = retry;
        self
    }

    /// Sets the handshake request options.
    #[inline]
    #[must_use]
    pub fn request_options(mut self, request_options: RequestOptions) -> Self {
        self.options.request_options = request_options;
        self
    }

    /// Sets the WebSocket client configuration.
    #[inline]
    #[must_use]
    pub fn client_config(mut self, client_config: ClientConfig) -> Self {
        self.options.client_config = client_config;
        self
    }

    /// Sets the close code that ends the transport for good.
    #[inline]
    #[must_use]
    pub fn terminal_close_code(mut self, code: u16) -> Self {
        self.options.terminal_close_code = code;
        self
    }

    /// Uses a custom socket factory instead of the WebSocket connector.
    #[inline]
    #[must_use]
    pub fn connector(mut self, connector: impl Connector) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Switches to another codec.
    #[must_use]
    pub fn codec<D: Codec>(self, codec: D) -> TransportBuilder<D> {
        TransportBuilder {
            address: self.address,
            options: self.options,
            connector: self.connector,
            codec,
        }
    }

    /// Builds the transport and starts connecting.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidAddress`] if the address is not a URL
    /// - [`Error::Config`] if the scheme is not `ws`/`wss`
    /// - [`Error::Config`] if the retry policy is invalid
    pub fn build(self) -> Result<Transport<C>> {
        let address = self.validate_address()?;
        self.options.validate()?;

        let connector: Arc<dyn Connector> = match self.connector {
            Some(connector) => connector,
            None => Arc::new(WebSocketConnector::new()),
        };

        Ok(Transport::spawn(address, self.options, connector, self.codec))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl<C: Codec> TransportBuilder<C> {
    /// Parses the address and checks its scheme.
    fn validate_address(&self) -> Result<Url> {
        let address = Url::parse(&self.address)?;

        match address.scheme() {
            "ws" | "wss" => Ok(address),
            other => Err(Error::config(format!(
                "Unsupported scheme '{other}' in {}\n\
                 Use a ws:// or wss:// address.",
                self.address
            ))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
