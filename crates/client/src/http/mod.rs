//! HTTP layer: bare transport and the authenticated client façade
//!
//! The transport knows nothing about authentication; the client layers
//! bearer injection, 401 handling, and single-replay on top of it.

pub mod client;
pub mod transport;

pub use client::{ApiClient, ApiClientBuilder, ApiClientConfig, UploadPayload};
pub use transport::{HttpTransport, HttpTransportBuilder, TransportError};
