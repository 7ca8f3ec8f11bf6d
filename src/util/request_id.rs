//! Request IDs for correlating the log lines of one relayed request.

use hyper::HeaderMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Header a client or an upstream proxy may use to supply its own ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest client-supplied ID that is accepted as-is.
const MAX_INBOUND_ID_LEN: usize = 128;

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a short request ID based on a counter.
///
/// Only unique within a single process.
/// Format: `req-{counter}` where counter is zero-padded to 16 hex digits.
pub fn generate_short_request_id() -> String {
    let count = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("req-{:016x}", count)
}

/// Request ID attached to every log line of a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    /// Create a new short request ID.
    pub fn short() -> Self {
        Self(generate_short_request_id())
    }

    /// Reuse the inbound `x-request-id` when it is present and printable,
    /// otherwise generate a short ID. The header itself is forwarded
    /// untouched either way.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty() && id.len() <= MAX_INBOUND_ID_LEN)
            .map(Self::from_string)
            .unwrap_or_else(Self::short)
    }

    /// Create a request ID from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the request ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
