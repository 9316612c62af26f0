//! Transport configuration.
//!
//! Options are plain structs with fluent `with_*` builders. Every struct
//! also deserializes from camelCase JSON, with durations given in
//! milliseconds:
//!
//! ```json
//! {
//!   "origin": "https://app.example.com",
//!   "headers": { "x-client": "worker-1" },
//!   "requestOptions": { "connectTimeout": 5000 },
//!   "retry": { "retries": 5, "factor": 2, "minTimeout": 500, "maxTimeout": 8000 }
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `options` | Connection options (origin, headers, client config) |
//! | `retry` | Backoff policy for connection attempts |

// ============================================================================
// Submodules
// ============================================================================

/// Connection options.
pub mod options;

/// Retry and backoff policy.
pub mod retry;

// ============================================================================
// Re-exports
// ============================================================================

pub use options::{ClientConfig, RequestOptions, TransportOptions};
pub use retry::RetryPolicy;

// ============================================================================
// Duration Serde Helpers
// ============================================================================

/// Serializes a [`Duration`](std::time::Duration) as integer milliseconds.
pub(crate) mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Same as [`millis`] for optional durations.
pub(crate) mod millis_opt {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => super::millis::serialize(duration, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
