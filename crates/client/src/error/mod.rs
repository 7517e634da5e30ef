//! Failure translation and the notification side-channel
//!
//! Every failure that surfaces to a caller passes through the
//! [`ErrorTranslator`] exactly once. Translation maps a transport-layer
//! failure (status + body, or no response at all) into the structured
//! [`DomainError`] shape and pushes it to the [`ErrorNotifier`] side-channel
//! in the same step, so notification dedup along retry chains is
//! structural, not bookkeeping.

use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::Value;
use tracing::warn;

use tessera_domain::{ApiEnvelope, DomainError};

/// Side-channel sink for surfaced errors (toast/log layer, out of scope
/// here). Receives each translated error exactly once.
pub trait ErrorNotifier: Send + Sync {
    /// Observe one surfaced error.
    fn notify(&self, error: &DomainError);
}

/// Default notifier: structured log via `tracing`.
pub struct TracingNotifier;

impl ErrorNotifier for TracingNotifier {
    fn notify(&self, error: &DomainError) {
        warn!(code = %error.code, status = error.status_code, "api error: {}", error.message);
    }
}

/// Maps transport failures into [`DomainError`] and feeds the notifier.
///
/// Never panics and never returns a raw transport error: when the failure
/// cannot be translated into a well-formed shape, the fixed
/// [`DomainError::internal_fallback`] is returned instead.
pub struct ErrorTranslator {
    notifier: Arc<dyn ErrorNotifier>,
}

impl ErrorTranslator {
    /// Create a translator pushing to the given notifier.
    #[must_use]
    pub fn new(notifier: Arc<dyn ErrorNotifier>) -> Self {
        Self { notifier }
    }

    /// Translate an error response (non-success status plus body).
    ///
    /// A well-formed error envelope is copied verbatim. A body that is not
    /// an envelope at all counts as malformed and synthesizes the fixed
    /// network-error shape. An envelope that violates the contract (claims
    /// success on an error status, or carries no error object) falls back
    /// to the stable internal-error shape.
    pub fn translate_response(&self, status: StatusCode, body: &str) -> DomainError {
        let error = match serde_json::from_str::<ApiEnvelope<Value>>(body) {
            Ok(envelope) if !envelope.success => {
                envelope.error.unwrap_or_else(DomainError::internal_fallback)
            }
            Ok(_) => DomainError::internal_fallback(),
            Err(_) => DomainError::network(format!("request failed with status {status}")),
        };
        self.notifier.notify(&error);
        error
    }

    /// Translate a failure that never produced a response: network
    /// unreachable, timeout, unreadable or malformed body.
    pub fn translate_transport(&self, message: &str) -> DomainError {
        let error = DomainError::network(message);
        self.notifier.notify(&error);
        error
    }
}
