//! # Tessera Client
//!
//! Credential lifecycle and request coordination core of the Tessera admin
//! dashboard's API layer.
//!
//! The one piece of this client with real engineering contracts is the
//! credential-refresh coordination: every outbound request carries the
//! bearer credential, an authentication failure triggers exactly one
//! refresh call no matter how many requests fail concurrently, failed
//! requests replay once with the new credential, and an unrecoverable
//! refresh failure clears the session and emits a process-wide logout
//! signal.
//!
//! # Usage Example
//!
//! ```no_run
//! use tessera_client::{ApiClient, ApiClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ApiClient::builder()
//!         .config(ApiClientConfig {
//!             base_url: "https://api.tessera.io/v1".to_string(),
//!             ..ApiClientConfig::default()
//!         })
//!         .build()?;
//!
//!     // React to session loss (refresh failure or explicit logout)
//!     let mut logout = client.events().subscribe();
//!     tokio::spawn(async move {
//!         if logout.recv().await.is_ok() {
//!             // redirect to the login screen
//!         }
//!     });
//!
//!     client.login("admin@tessera.io", "secret").await?;
//!
//!     let institutions: serde_json::Value = client.get("/institutions").await?;
//!     println!("{institutions}");
//!
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - **[`auth`]**: credential pair, store, refresh coordination, logout
//!   signal
//! - **[`http`]**: bare transport and the authenticated client façade
//! - **[`error`]**: failure translation and the notification side-channel

pub mod auth;
pub mod error;
pub mod http;

// Re-export commonly used items
pub use auth::{
    AuthEvent, AuthEvents, CredentialBackend, CredentialKeys, CredentialPair, CredentialStore,
    KeyringBackend, MemoryBackend, RefreshCoordinator, RefreshOutcome, StoreError,
};
pub use error::{ErrorNotifier, ErrorTranslator, TracingNotifier};
pub use http::{
    ApiClient, ApiClientBuilder, ApiClientConfig, HttpTransport, HttpTransportBuilder,
    TransportError, UploadPayload,
};
