//! Error types shared with the backend
//!
//! Every Tessera backend failure carries the same structured shape, and the
//! client core synthesizes the identical shape for failures that never
//! produced a response. Callers therefore match on one error type at every
//! layer boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error code synthesized for transport-level failures (timeout, refused
/// connection, unreadable or malformed body).
pub const NETWORK_ERROR: &str = "NETWORK_ERROR";

/// Error code of the fixed fallback used when error translation itself
/// cannot produce a well-formed error.
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";

/// Structured error surfaced to every caller of the client core.
///
/// Deserialized verbatim from the backend's error envelope when one is
/// available; otherwise synthesized via [`DomainError::network`] or
/// [`DomainError::internal_fallback`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("{code} ({status_code}): {message}")]
pub struct DomainError {
    /// HTTP status associated with the failure.
    pub status_code: u16,

    /// Machine-readable error code (e.g. `INVALID_REFRESH_TOKEN`).
    pub code: String,

    /// Human-readable description.
    pub message: String,

    /// Optional structured detail payload from the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// Backend request correlation id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    /// Server-side timestamp of the failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Request path the backend saw.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl DomainError {
    /// Synthesize an error for a failure that never produced a structured
    /// response (network unreachable, timeout, malformed body).
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status_code: 500,
            code: NETWORK_ERROR.to_string(),
            message: message.into(),
            details: None,
            request_id: None,
            timestamp: None,
            path: None,
        }
    }

    /// Fixed fallback returned when translation itself faults. Callers can
    /// rely on this shape being stable.
    #[must_use]
    pub fn internal_fallback() -> Self {
        Self {
            status_code: 500,
            code: INTERNAL_ERROR.to_string(),
            message: "An unexpected error occurred".to_string(),
            details: None,
            request_id: None,
            timestamp: None,
            path: None,
        }
    }

    /// Whether this error represents an authentication failure.
    #[must_use]
    pub fn is_authentication(&self) -> bool {
        self.status_code == 401
    }
}

/// Result type alias for Tessera client operations
pub type Result<T> = std::result::Result<T, DomainError>;
