//! Timeout configuration for fragment fetches.

use std::time::Duration;

/// Default content fetch timeout when a fragment's render configuration
/// does not specify one.
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout configuration for a fetch operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Connection timeout.
    pub connect: Duration,
    /// Time to first byte.
    pub response: Duration,
    /// Total operation timeout.
    pub total: Duration,
}

impl TimeoutConfig {
    /// Create a new timeout configuration.
    pub fn new(connect: Duration, response: Duration, total: Duration) -> Self {
        Self {
            connect,
            response,
            total,
        }
    }

    /// Create from a single total timeout.
    pub fn from_total(total: Duration) -> Self {
        Self {
            connect: Duration::from_millis(total.as_millis() as u64 / 4),
            response: Duration::from_millis(total.as_millis() as u64 / 2),
            total,
        }
    }

    /// Resolve a fragment's configured timeout (milliseconds), falling back
    /// to the system default.
    pub fn from_render_timeout(timeout_ms: Option<u64>) -> Self {
        let total = timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_RENDER_TIMEOUT);
        Self::from_total(total)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self::from_total(DEFAULT_RENDER_TIMEOUT)
    }
}
