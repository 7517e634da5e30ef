//! Single-flight credential refresh coordination
//!
//! At most one refresh network call is in flight system-wide, no matter how
//! many requests fail authentication concurrently. The first caller to find
//! the coordinator idle becomes the leader and performs the call; everyone
//! else is parked in a FIFO queue and woken with that same cycle's outcome.
//! The queue is drained in the same critical section that resets the state,
//! so a caller can never be resolved by a cycle that started after it was
//! queued.
//!
//! The refresh call goes out on a dedicated bare transport with its own
//! (shorter) timeout. It must never pass through the authenticated client:
//! a 401 on the refresh call itself would otherwise recurse into another
//! refresh.

use std::mem;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::Method;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use tessera_domain::{ApiEnvelope, DomainError};

use super::events::AuthEvents;
use super::store::CredentialStore;
use super::types::{CredentialPair, RefreshRequest};
use crate::error::ErrorTranslator;
use crate::http::transport::{HttpTransport, TransportError};

/// Outcome delivered to every caller of one refresh cycle.
pub type RefreshOutcome = Result<CredentialPair, DomainError>;

enum RefreshState {
    Idle,
    Refreshing { waiters: Vec<oneshot::Sender<RefreshOutcome>> },
}

enum Role {
    Leader,
    Follower(oneshot::Receiver<RefreshOutcome>),
}

/// Single-flight refresh state machine.
///
/// Constructed once at process start and shared by reference; all mutable
/// state lives behind one mutex so the `Idle -> Refreshing` transition and
/// the queue append are a single serialized operation, correct under true
/// multi-thread execution as well as cooperative scheduling.
pub struct RefreshCoordinator {
    transport: HttpTransport,
    refresh_url: String,
    store: Arc<CredentialStore>,
    translator: Arc<ErrorTranslator>,
    events: Arc<AuthEvents>,
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    /// Create a coordinator posting to `refresh_url` with the given timeout.
    ///
    /// The timeout should be shorter than ordinary request timeouts: a hung
    /// refresh stalls every queued caller.
    ///
    /// # Errors
    /// Returns error if the dedicated transport cannot be constructed.
    pub fn new(
        refresh_url: String,
        timeout: Duration,
        store: Arc<CredentialStore>,
        translator: Arc<ErrorTranslator>,
        events: Arc<AuthEvents>,
    ) -> Result<Self, TransportError> {
        let transport = HttpTransport::builder().timeout(timeout).build()?;

        Ok(Self {
            transport,
            refresh_url,
            store,
            translator,
            events,
            state: Mutex::new(RefreshState::Idle),
        })
    }

    /// Obtain a freshly refreshed credential pair.
    ///
    /// If no refresh is in flight, this caller leads: it performs the one
    /// network call, persists the new pair on success, or clears the store
    /// and emits the logout signal on failure. If a refresh is already in
    /// flight, the caller is queued and settles with the in-flight cycle's
    /// outcome; no second network call is issued.
    ///
    /// # Errors
    /// Returns the translated refresh failure; every caller of the same
    /// cycle receives the same error.
    pub async fn request_refresh(&self, refresh_token: &str) -> RefreshOutcome {
        let role = {
            let mut state = self.state.lock().unwrap();
            match &mut *state {
                RefreshState::Refreshing { waiters } => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    debug!(queued = waiters.len(), "refresh in flight; queueing caller");
                    Role::Follower(rx)
                }
                RefreshState::Idle => {
                    *state = RefreshState::Refreshing { waiters: Vec::new() };
                    Role::Leader
                }
            }
        };

        match role {
            Role::Follower(rx) => {
                rx.await.unwrap_or_else(|_| Err(DomainError::internal_fallback()))
            }
            Role::Leader => self.lead_refresh(refresh_token).await,
        }
    }

    async fn lead_refresh(&self, refresh_token: &str) -> RefreshOutcome {
        info!("refreshing access credential");
        let outcome = self.execute_refresh(refresh_token).await;

        match &outcome {
            Ok(pair) => {
                if let Err(err) = self.store.set(pair).await {
                    warn!(error = %err, "failed to persist refreshed credentials");
                }
                info!("credential refresh succeeded");
            }
            Err(error) => {
                warn!(code = %error.code, "credential refresh failed; logging out");
                if let Err(err) = self.store.clear().await {
                    warn!(error = %err, "failed to clear credentials after refresh failure");
                }
                self.events.emit_logout();
            }
        }

        let waiters = {
            let mut state = self.state.lock().unwrap();
            match mem::replace(&mut *state, RefreshState::Idle) {
                RefreshState::Refreshing { waiters } => waiters,
                RefreshState::Idle => Vec::new(),
            }
        };

        debug!(waiters = waiters.len(), "releasing queued callers");
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }

        outcome
    }

    async fn execute_refresh(&self, refresh_token: &str) -> RefreshOutcome {
        let request = self
            .transport
            .request(Method::POST, &self.refresh_url)
            .json(&RefreshRequest { refresh_token });

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(err) => return Err(self.translator.translate_transport(&err.to_string())),
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                return Err(self
                    .translator
                    .translate_transport(&format!("failed to read refresh response: {err}")));
            }
        };

        if !status.is_success() {
            return Err(self.translator.translate_response(status, &body));
        }

        let envelope: ApiEnvelope<CredentialPair> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(err) => {
                return Err(self
                    .translator
                    .translate_transport(&format!("malformed refresh response: {err}")));
            }
        };

        match envelope.data {
            Some(pair) if envelope.success && pair.is_valid() => Ok(pair),
            _ => Err(self.translator.translate_transport("refresh returned no usable credential pair")),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::auth::events::AuthEvent;
    use crate::auth::store::{CredentialKeys, MemoryBackend};
    use crate::error::TracingNotifier;

    use super::*;

    fn coordinator_against(url: &str) -> (Arc<RefreshCoordinator>, Arc<CredentialStore>, Arc<AuthEvents>) {
        let store = Arc::new(CredentialStore::new(
            Arc::new(MemoryBackend::new()),
            CredentialKeys::default(),
        ));
        let translator = Arc::new(ErrorTranslator::new(Arc::new(TracingNotifier)));
        let events = Arc::new(AuthEvents::new());
        let coordinator = Arc::new(
            RefreshCoordinator::new(
                format!("{url}/auth/refresh"),
                Duration::from_secs(2),
                store.clone(),
                translator,
                events.clone(),
            )
            .expect("coordinator"),
        );
        (coordinator, store, events)
    }

    #[tokio::test]
    async fn successful_refresh_persists_new_pair() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .and(body_json(json!({"refreshToken": "R1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {"accessToken": "A2", "refreshToken": "R2"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (coordinator, store, _events) = coordinator_against(&server.uri());

        let pair = coordinator.request_refresh("R1").await.unwrap();

        assert_eq!(pair, CredentialPair::new("A2", "R2"));
        assert_eq!(store.get().await.unwrap(), Some(pair));
    }

    #[tokio::test]
    async fn failed_refresh_clears_store_and_emits_logout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "success": false,
                "error": {
                    "statusCode": 400,
                    "code": "INVALID_REFRESH_TOKEN",
                    "message": "refresh token revoked"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (coordinator, store, events) = coordinator_against(&server.uri());
        store.set(&CredentialPair::new("A1", "R1")).await.unwrap();
        let mut logout_rx = events.subscribe();

        let error = coordinator.request_refresh("R1").await.unwrap_err();

        assert_eq!(error.code, "INVALID_REFRESH_TOKEN");
        assert_eq!(store.get().await.unwrap(), None);
        assert_eq!(logout_rx.try_recv().unwrap(), AuthEvent::LoggedOut);
    }

    #[tokio::test]
    async fn queued_caller_observes_leader_outcome_without_second_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(150))
                    .set_body_json(json!({
                        "success": true,
                        "data": {"accessToken": "A2", "refreshToken": "R2"}
                    })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let (coordinator, _store, _events) = coordinator_against(&server.uri());

        let leader = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.request_refresh("R1").await })
        };
        // Give the leader time to take the Refreshing slot before queueing
        tokio::time::sleep(Duration::from_millis(30)).await;
        let follower = coordinator.request_refresh("R1").await;

        let leader = leader.await.unwrap();
        assert_eq!(leader.unwrap(), CredentialPair::new("A2", "R2"));
        assert_eq!(follower.unwrap(), CredentialPair::new("A2", "R2"));
    }

    #[tokio::test]
    async fn incomplete_pair_in_refresh_response_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {"accessToken": "A2", "refreshToken": "undefined"}
            })))
            .mount(&server)
            .await;

        let (coordinator, store, _events) = coordinator_against(&server.uri());

        let error = coordinator.request_refresh("R1").await.unwrap_err();

        assert_eq!(error.code, tessera_domain::NETWORK_ERROR);
        assert_eq!(store.get().await.unwrap(), None);
    }
}
