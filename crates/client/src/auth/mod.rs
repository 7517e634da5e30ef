//! Credential lifecycle for the Tessera admin API
//!
//! This module owns everything credential-shaped in the client core:
//!
//! ```text
//! ┌──────────────────┐
//! │   ApiClient      │  (http module) reads the store, retries on 401
//! └────────┬─────────┘
//!          │
//!          ├──► RefreshCoordinator   (single-flight refresh + FIFO queue)
//!          │          │
//!          │          ├──► CredentialStore   (pair persistence)
//!          │          └──► AuthEvents        (logout fan-out)
//!          │
//!          └──► CredentialStore      (bearer credential lookup)
//! ```
//!
//! # Module Organization
//!
//! - **[`types`]**: credential pair and auth endpoint bodies
//! - **[`store`]**: pair persistence over a pluggable backend
//! - **[`refresh`]**: single-flight refresh state machine
//! - **[`events`]**: fire-and-forget logout signal

pub mod events;
pub mod refresh;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use events::{AuthEvent, AuthEvents};
pub use refresh::{RefreshCoordinator, RefreshOutcome};
pub use store::{
    CredentialBackend, CredentialKeys, CredentialStore, KeyringBackend, MemoryBackend, StoreError,
};
pub use types::CredentialPair;
