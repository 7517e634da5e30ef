//! Authenticated API client with credential refresh and replay
//!
//! Façade over the bare transport: reads the credential store before every
//! dispatch, attaches the bearer credential when one is present, and funnels
//! authentication failures through the [`RefreshCoordinator`]. A request
//! that fails authentication is replayed at most once with the refreshed
//! credential; the explicit attempt counter is what breaks the loop if the
//! refreshed credential is itself rejected.

use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use tessera_domain::{ApiEnvelope, DomainError};

use crate::auth::events::AuthEvents;
use crate::auth::refresh::RefreshCoordinator;
use crate::auth::store::{CredentialBackend, CredentialKeys, CredentialStore, MemoryBackend};
use crate::auth::types::{CredentialPair, LoginRequest};
use crate::error::{ErrorNotifier, ErrorTranslator, TracingNotifier};
use crate::http::transport::{HttpTransport, TransportError};

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// Base URL for the admin API (e.g. "https://api.tessera.io/v1")
    pub base_url: String,
    /// Timeout for ordinary API requests
    pub timeout: Duration,
    /// Timeout for the credential refresh call. Kept shorter than `timeout`:
    /// a hung refresh stalls every queued request.
    pub refresh_timeout: Duration,
    /// Optional User-Agent header
    pub user_agent: Option<String>,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.tessera.io/v1".to_string(),
            timeout: Duration::from_secs(30),
            refresh_timeout: Duration::from_secs(10),
            user_agent: None,
        }
    }
}

/// One file part for the multipart upload variant.
///
/// Owned bytes rather than a stream so the request can be rebuilt verbatim
/// for the single replay dispatch.
#[derive(Debug, Clone)]
pub struct UploadPayload {
    /// Multipart field name.
    pub field: String,
    /// File name reported to the backend.
    pub file_name: String,
    /// MIME type of the content.
    pub mime: String,
    /// File content.
    pub bytes: Vec<u8>,
}

impl UploadPayload {
    fn to_form(&self) -> Result<Form, TransportError> {
        let part = Part::bytes(self.bytes.clone())
            .file_name(self.file_name.clone())
            .mime_str(&self.mime)
            .map_err(|err| TransportError::Request(err.to_string()))?;
        Ok(Form::new().part(self.field.clone(), part))
    }
}

enum Payload {
    None,
    Json(Value),
    Multipart(UploadPayload),
}

/// Authenticated API client.
pub struct ApiClient {
    transport: HttpTransport,
    store: Arc<CredentialStore>,
    coordinator: Arc<RefreshCoordinator>,
    translator: Arc<ErrorTranslator>,
    events: Arc<AuthEvents>,
    config: ApiClientConfig,
}

impl ApiClient {
    /// Create a builder for fluent configuration.
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Execute a GET request.
    ///
    /// # Errors
    /// Returns the translated error if the request fails irrecoverably.
    #[instrument(skip(self), fields(path = %path))]
    pub async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R, DomainError> {
        self.execute(Method::GET, path, Payload::None).await
    }

    /// Execute a POST request with a JSON body.
    ///
    /// # Errors
    /// Returns the translated error if the request fails irrecoverably.
    #[instrument(skip(self, body), fields(path = %path))]
    pub async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, DomainError> {
        self.execute(Method::POST, path, Payload::Json(self.to_json(body)?)).await
    }

    /// Execute a PUT request with a JSON body.
    ///
    /// # Errors
    /// Returns the translated error if the request fails irrecoverably.
    #[instrument(skip(self, body), fields(path = %path))]
    pub async fn put<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, DomainError> {
        self.execute(Method::PUT, path, Payload::Json(self.to_json(body)?)).await
    }

    /// Execute a PATCH request with a JSON body.
    ///
    /// # Errors
    /// Returns the translated error if the request fails irrecoverably.
    #[instrument(skip(self, body), fields(path = %path))]
    pub async fn patch<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, DomainError> {
        self.execute(Method::PATCH, path, Payload::Json(self.to_json(body)?)).await
    }

    /// Execute a DELETE request.
    ///
    /// # Errors
    /// Returns the translated error if the request fails irrecoverably.
    #[instrument(skip(self), fields(path = %path))]
    pub async fn delete<R: DeserializeOwned>(&self, path: &str) -> Result<R, DomainError> {
        self.execute(Method::DELETE, path, Payload::None).await
    }

    /// Execute a multipart upload (e.g. card image, roster CSV).
    ///
    /// # Errors
    /// Returns the translated error if the request fails irrecoverably.
    #[instrument(skip(self, payload), fields(path = %path, file = %payload.file_name))]
    pub async fn upload<R: DeserializeOwned>(
        &self,
        path: &str,
        payload: UploadPayload,
    ) -> Result<R, DomainError> {
        self.execute(Method::POST, path, Payload::Multipart(payload)).await
    }

    /// Authenticate with email/password and persist the issued pair.
    ///
    /// # Errors
    /// Returns the translated error if the login is rejected or fails.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(&self, email: &str, password: &str) -> Result<CredentialPair, DomainError> {
        let pair: CredentialPair =
            self.post("/auth/login", &LoginRequest { email, password }).await?;

        if let Err(err) = self.store.set(&pair).await {
            warn!(error = %err, "failed to persist credentials after login");
        }
        info!("login succeeded");
        Ok(pair)
    }

    /// End the session: clear stored credentials and emit the logout signal.
    ///
    /// # Errors
    /// Returns the translated error if the store cannot be cleared.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), DomainError> {
        self.store
            .clear()
            .await
            .map_err(|err| {
                self.translator.translate_transport(&format!("failed to clear credentials: {err}"))
            })?;
        self.events.emit_logout();
        info!("logged out");
        Ok(())
    }

    /// Credential store shared with the coordinator.
    #[must_use]
    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// Auth event channel (logout signal).
    #[must_use]
    pub fn events(&self) -> &Arc<AuthEvents> {
        &self.events
    }

    /// Client configuration.
    #[must_use]
    pub fn config(&self) -> &ApiClientConfig {
        &self.config
    }

    fn to_json<B: Serialize>(&self, body: &B) -> Result<Value, DomainError> {
        serde_json::to_value(body).map_err(|err| {
            self.translator.translate_transport(&format!("failed to serialize request body: {err}"))
        })
    }

    async fn execute<R: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        payload: Payload,
    ) -> Result<R, DomainError> {
        let url = format!("{}{}", self.config.base_url, path);
        let mut attempt: u8 = 0;

        loop {
            let response = match self.dispatch(&method, &url, &payload).await {
                Ok(response) => response,
                Err(err) => return Err(self.translator.translate_transport(&err.to_string())),
            };

            let status = response.status();

            if status == StatusCode::UNAUTHORIZED && attempt == 0 {
                if let Ok(Some(pair)) = self.store.get().await {
                    attempt = 1;
                    debug!(%url, "authentication failure; requesting credential refresh");
                    // Refresh failure takes precedence over the original 401
                    self.coordinator.request_refresh(&pair.refresh_token).await?;
                    continue;
                }
                // No refresh credential available; fall through and surface
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(self.translator.translate_response(status, &body));
            }

            return self.decode(response).await;
        }
    }

    async fn dispatch(
        &self,
        method: &Method,
        url: &str,
        payload: &Payload,
    ) -> Result<Response, TransportError> {
        let mut request = self.transport.request(method.clone(), url);

        match self.store.get().await {
            Ok(Some(pair)) => {
                request = request.bearer_auth(&pair.access_token);
            }
            // Absence is not an error here: the request goes out
            // unauthenticated and the backend decides
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "credential store read failed; dispatching unauthenticated");
            }
        }

        request = match payload {
            Payload::None => request,
            Payload::Json(body) => request.json(body),
            Payload::Multipart(upload) => request.multipart(upload.to_form()?),
        };

        self.transport.send(request).await
    }

    async fn decode<R: DeserializeOwned>(&self, response: Response) -> Result<R, DomainError> {
        let status = response.status();

        // 204/205 have no body by RFC
        if status == StatusCode::NO_CONTENT || status == StatusCode::RESET_CONTENT {
            return serde_json::from_value(Value::Null).map_err(|_| {
                self.translator.translate_transport(
                    "response had no content but the caller expects a body",
                )
            });
        }

        let body = response.text().await.map_err(|err| {
            self.translator.translate_transport(&format!("failed to read response body: {err}"))
        })?;

        let envelope: ApiEnvelope<R> = serde_json::from_str(&body).map_err(|err| {
            self.translator.translate_transport(&format!("malformed response body: {err}"))
        })?;

        if envelope.success {
            return match envelope.data {
                Some(data) => Ok(data),
                // Success with no payload: callers expecting () decode null
                None => serde_json::from_value(Value::Null).map_err(|_| {
                    self.translator
                        .translate_transport("success response carried no data payload")
                }),
            };
        }

        Err(self.translator.translate_response(status, &body))
    }
}

/// Builder for [`ApiClient`].
#[derive(Default)]
pub struct ApiClientBuilder {
    config: Option<ApiClientConfig>,
    backend: Option<Arc<dyn CredentialBackend>>,
    keys: Option<CredentialKeys>,
    notifier: Option<Arc<dyn ErrorNotifier>>,
}

impl ApiClientBuilder {
    /// Set the client configuration.
    pub fn config(mut self, config: ApiClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the credential persistence backend (defaults to in-memory).
    pub fn backend(mut self, backend: Arc<dyn CredentialBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the credential key names.
    pub fn keys(mut self, keys: CredentialKeys) -> Self {
        self.keys = Some(keys);
        self
    }

    /// Set the error notification sink (defaults to `tracing` logging).
    pub fn notifier(mut self, notifier: Arc<dyn ErrorNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Build the API client and its refresh coordinator.
    ///
    /// # Errors
    /// Returns error if either transport cannot be constructed.
    pub fn build(self) -> Result<ApiClient, TransportError> {
        let config = self.config.unwrap_or_default();

        let backend =
            self.backend.unwrap_or_else(|| Arc::new(MemoryBackend::new()) as Arc<dyn CredentialBackend>);
        let store = Arc::new(CredentialStore::new(backend, self.keys.unwrap_or_default()));

        let notifier =
            self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier) as Arc<dyn ErrorNotifier>);
        let translator = Arc::new(ErrorTranslator::new(notifier));

        let events = Arc::new(AuthEvents::new());

        let mut transport_builder = HttpTransport::builder().timeout(config.timeout);
        if let Some(agent) = &config.user_agent {
            transport_builder = transport_builder.user_agent(agent.clone());
        }
        let transport = transport_builder.build()?;

        let coordinator = Arc::new(RefreshCoordinator::new(
            format!("{}/auth/refresh", config.base_url),
            config.refresh_timeout,
            store.clone(),
            translator.clone(),
            events.clone(),
        )?);

        Ok(ApiClient { transport, store, coordinator, translator, events, config })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::auth::events::AuthEvent;

    use super::*;

    async fn client_against(server: &MockServer) -> ApiClient {
        ApiClient::builder()
            .config(ApiClientConfig {
                base_url: server.uri(),
                timeout: Duration::from_secs(5),
                refresh_timeout: Duration::from_secs(2),
                user_agent: None,
            })
            .build()
            .expect("api client")
    }

    #[tokio::test]
    async fn attaches_bearer_credential_when_present() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/institutions"))
            .and(header("authorization", "Bearer A1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"success": true, "data": {"items": []}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_against(&server).await;
        client.store().set(&CredentialPair::new("A1", "R1")).await.unwrap();

        let result: Value = client.get("/institutions").await.unwrap();
        assert_eq!(result, json!({"items": []}));
    }

    #[tokio::test]
    async fn dispatches_unauthenticated_when_store_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"success": true, "data": "ok"})),
            )
            .mount(&server)
            .await;

        let client = client_against(&server).await;
        let result: String = client.get("/health").await.unwrap();
        assert_eq!(result, "ok");

        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn no_content_decodes_to_unit() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/cards/7"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = client_against(&server).await;
        let result: Result<(), DomainError> = client.delete("/cards/7").await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn post_sends_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/phases"))
            .and(body_json(json!({"name": "enrollment"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"success": true, "data": {"id": 1}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_against(&server).await;
        let result: Value = client.post("/phases", &json!({"name": "enrollment"})).await.unwrap();
        assert_eq!(result["id"], 1);
    }

    #[tokio::test]
    async fn upload_sends_multipart_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cards/7/photo"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"success": true, "data": "ok"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_against(&server).await;
        let payload = UploadPayload {
            field: "photo".to_string(),
            file_name: "badge.png".to_string(),
            mime: "image/png".to_string(),
            bytes: vec![0x89, 0x50, 0x4e, 0x47],
        };
        let result: String = client.upload("/cards/7/photo", payload).await.unwrap();
        assert_eq!(result, "ok");

        let requests = server.received_requests().await.unwrap();
        let content_type = requests[0].headers.get("content-type").unwrap().to_str().unwrap();
        assert!(content_type.starts_with("multipart/form-data"));
    }

    #[tokio::test]
    async fn login_persists_issued_pair() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .and(body_json(json!({"email": "admin@tessera.io", "password": "hunter2"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {"accessToken": "A1", "refreshToken": "R1"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_against(&server).await;
        let pair = client.login("admin@tessera.io", "hunter2").await.unwrap();

        assert_eq!(pair, CredentialPair::new("A1", "R1"));
        assert_eq!(client.store().get().await.unwrap(), Some(pair));
    }

    #[tokio::test]
    async fn logout_clears_store_and_emits_event() {
        let server = MockServer::start().await;
        let client = client_against(&server).await;
        client.store().set(&CredentialPair::new("A1", "R1")).await.unwrap();
        let mut logout_rx = client.events().subscribe();

        client.logout().await.unwrap();

        assert_eq!(client.store().get().await.unwrap(), None);
        assert_eq!(logout_rx.try_recv().unwrap(), AuthEvent::LoggedOut);
    }

    #[tokio::test]
    async fn builder_defaults_build_cleanly() {
        let client = ApiClient::builder().build();
        assert!(client.is_ok());
    }
}
