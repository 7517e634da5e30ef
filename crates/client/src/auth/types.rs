//! Credential types and wire bodies for the auth endpoints
//!
//! The access/refresh pair is the only credential state the client core
//! carries. Validation lives here so the store and the refresh path apply
//! the same rules.

use serde::{Deserialize, Serialize};

/// Access/refresh credential pair.
///
/// The access token is the short-lived bearer credential attached to every
/// outbound request; the refresh token is used solely to obtain a new pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPair {
    /// Short-lived bearer credential authorizing API calls.
    pub access_token: String,

    /// Longer-lived credential exchanged for a new access token.
    pub refresh_token: String,
}

impl CredentialPair {
    /// Create a new credential pair.
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self { access_token: access_token.into(), refresh_token: refresh_token.into() }
    }

    /// Whether both fields hold semantically valid values.
    ///
    /// The literal strings `"undefined"` and `"null"` count as absent; older
    /// storage clients have been observed writing stringified absent values.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        field_present(&self.access_token) && field_present(&self.refresh_token)
    }
}

/// Whether a stored credential field holds a usable value.
pub(crate) fn field_present(value: &str) -> bool {
    !value.is_empty() && value != "undefined" && value != "null"
}

/// Body of `POST /auth/refresh`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Body of `POST /auth/login`.
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}
