//! Backend response envelope
//!
//! The Tessera backend wraps every payload in a success/error envelope. The
//! client core unwraps it once, at the response boundary, so callers only
//! ever see the inner `data` type or a [`DomainError`].

use serde::Deserialize;

use crate::errors::DomainError;

/// Envelope returned by every backend endpoint.
///
/// `success: true` responses carry `data`; `success: false` responses carry
/// `error`. Both fields are optional at the serde level so a malformed
/// envelope deserializes instead of failing; the translator decides what a
/// shape violation means.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiEnvelope<T> {
    /// Whether the backend considers the request successful.
    pub success: bool,

    /// Payload for successful responses.
    #[serde(default)]
    pub data: Option<T>,

    /// Structured error for failed responses.
    #[serde(default)]
    pub error: Option<DomainError>,
}
