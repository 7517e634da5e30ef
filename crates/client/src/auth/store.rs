//! Credential persistence with defensive validation
//!
//! Stores the access/refresh pair under two configurable key names in a
//! pluggable backend. The store is pure persistence: no network calls, no
//! refresh logic. Readers always see the pair as a unit: either both
//! fields of one write, or nothing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use super::types::{field_present, CredentialPair};

/// Error type for credential storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying persistence medium failed.
    #[error("credential backend error: {0}")]
    Backend(String),
}

/// Pluggable persistence medium for credential fields.
///
/// Implementations store opaque string values by key. The store layers pair
/// semantics and validation on top; backends stay dumb.
#[async_trait]
pub trait CredentialBackend: Send + Sync {
    /// Read the value stored under `key`, if any.
    async fn read(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write `value` under `key`, replacing any previous value.
    async fn write(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove the value stored under `key`. Removing a missing key is not an
    /// error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Key names the credential pair persists under.
#[derive(Debug, Clone)]
pub struct CredentialKeys {
    /// Key holding the access token.
    pub access: String,

    /// Key holding the refresh token.
    pub refresh: String,
}

impl Default for CredentialKeys {
    fn default() -> Self {
        Self { access: "tessera.access".to_string(), refresh: "tessera.refresh".to_string() }
    }
}

/// Credential store over a pluggable backend.
///
/// Pair-level atomicity: `set` and `clear` hold a write guard across both
/// key operations, `get` holds a read guard across both reads, so a reader
/// never observes one field of a pair without the other.
pub struct CredentialStore {
    backend: Arc<dyn CredentialBackend>,
    keys: CredentialKeys,
    guard: RwLock<()>,
}

impl CredentialStore {
    /// Create a store over the given backend and key names.
    #[must_use]
    pub fn new(backend: Arc<dyn CredentialBackend>, keys: CredentialKeys) -> Self {
        Self { backend, keys, guard: RwLock::new(()) }
    }

    /// Persist the pair. Silently ignored when either field is missing or a
    /// stringified absent value; a half-valid pair is never written.
    ///
    /// # Errors
    /// Returns error if the backend fails to persist either field.
    pub async fn set(&self, pair: &CredentialPair) -> Result<(), StoreError> {
        if !pair.is_valid() {
            debug!("ignoring credential pair with missing fields");
            return Ok(());
        }

        let _write = self.guard.write().await;
        self.backend.write(&self.keys.access, &pair.access_token).await?;
        self.backend.write(&self.keys.refresh, &pair.refresh_token).await?;
        debug!("credential pair stored");
        Ok(())
    }

    /// Read the stored pair.
    ///
    /// Returns `None` when either field is missing or holds `"undefined"` /
    /// `"null"`; a half-present pair reads as absent.
    ///
    /// # Errors
    /// Returns error if the backend fails to read either field.
    pub async fn get(&self) -> Result<Option<CredentialPair>, StoreError> {
        let (access, refresh) = {
            let _read = self.guard.read().await;
            (self.backend.read(&self.keys.access).await?, self.backend.read(&self.keys.refresh).await?)
        };

        match (access, refresh) {
            (Some(access), Some(refresh))
                if field_present(&access) && field_present(&refresh) =>
            {
                Ok(Some(CredentialPair { access_token: access, refresh_token: refresh }))
            }
            _ => Ok(None),
        }
    }

    /// Remove both fields. Idempotent.
    ///
    /// # Errors
    /// Returns error if the backend fails to delete either field.
    pub async fn clear(&self) -> Result<(), StoreError> {
        let _write = self.guard.write().await;
        self.backend.delete(&self.keys.access).await?;
        self.backend.delete(&self.keys.refresh).await?;
        debug!("credential pair cleared");
        Ok(())
    }

    /// Whether a complete, valid pair is currently stored.
    pub async fn has_valid(&self) -> bool {
        matches!(self.get().await, Ok(Some(_)))
    }
}

/// In-memory backend for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryBackend {
    /// Create an empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialBackend for MemoryBackend {
    async fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.write().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// Platform keychain backend (macOS Keychain, Windows Credential Manager,
/// Linux Secret Service) via the `keyring` crate.
pub struct KeyringBackend {
    service: String,
}

impl KeyringBackend {
    /// Create a backend storing entries under the given keychain service
    /// name (e.g. `"Tessera.admin"`).
    #[must_use]
    pub fn new(service: impl Into<String>) -> Self {
        Self { service: service.into() }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry, StoreError> {
        keyring::Entry::new(&self.service, key).map_err(|e| StoreError::Backend(e.to_string()))
    }
}

#[async_trait]
impl CredentialBackend for KeyringBackend {
    async fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StoreError::Backend(e.to_string())),
        }
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entry(key)?.set_password(value).map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StoreError::Backend(e.to_string())),
        }
    }
}
