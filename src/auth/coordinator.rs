// Single-flight token refresh
// However many callers discover an expired token at once, exactly one refresh
// request goes out and every caller observes its outcome.

use std::sync::{Arc, Mutex};

use reqwest::Client;
use tokio::sync::oneshot;

use crate::error::RefreshFailed;
use crate::models::RefreshResponse;

use super::store::CredentialStore;

type Waiter = oneshot::Sender<Result<String, RefreshFailed>>;

/// Coordinator state: `refreshing == false` is IDLE, `true` is REFRESHING.
/// Waiters are registered while REFRESHING and settled FIFO when the in-flight
/// request completes.
#[derive(Default)]
struct FlightState {
    refreshing: bool,
    waiters: Vec<Waiter>,
}

/// Serializes token refresh across concurrent callers.
///
/// The refresh endpoint is credentialed by the HttpOnly session cookie carried
/// in the shared client's cookie store, not by the bearer token being
/// replaced.
pub struct RefreshCoordinator {
    store: Arc<CredentialStore>,
    client: Client,
    refresh_url: String,
    state: Mutex<FlightState>,
}

impl RefreshCoordinator {
    pub fn new(store: Arc<CredentialStore>, client: Client, refresh_url: String) -> Self {
        Self {
            store,
            client,
            refresh_url,
            state: Mutex::new(FlightState::default()),
        }
    }

    /// Obtain a fresh access token.
    ///
    /// If a refresh is already in flight the caller is queued and receives
    /// that flight's outcome; otherwise this call becomes the flight. On
    /// success the new token is written to the credential store before anyone
    /// is woken. On failure the store keeps the stale token; whether that
    /// means logout is the caller's policy, not ours.
    pub async fn refresh(&self) -> Result<String, RefreshFailed> {
        let receiver = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if state.refreshing {
                let (tx, rx) = oneshot::channel();
                state.waiters.push(tx);
                Some(rx)
            } else {
                state.refreshing = true;
                None
            }
        };

        if let Some(rx) = receiver {
            tracing::debug!("refresh already in flight, waiting for its outcome");
            return match rx.await {
                Ok(outcome) => outcome,
                Err(_) => Err(RefreshFailed::new(None, "in-flight refresh was abandoned")),
            };
        }

        // This task owns the flight from here on. The guard flips the state
        // back to IDLE and fails the queue if we are cancelled mid-request.
        let guard = FlightGuard { state: &self.state };

        let outcome = self.execute_refresh().await;

        if let Ok(token) = &outcome {
            self.store.set_access_token(token.clone()).await;
        }

        let waiters = guard.settle();
        if !waiters.is_empty() {
            tracing::debug!(waiters = waiters.len(), "fanning out refresh outcome");
        }
        for waiter in waiters {
            // A waiter that stopped listening is its own problem
            let _ = waiter.send(outcome.clone());
        }

        outcome
    }

    async fn execute_refresh(&self) -> Result<String, RefreshFailed> {
        tracing::debug!("refreshing access token");

        let response = self
            .client
            .post(&self.refresh_url)
            .send()
            .await
            .map_err(|e| RefreshFailed::new(None, format!("refresh request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "token refresh rejected");
            let message = if body.is_empty() {
                format!("refresh endpoint answered {status}")
            } else {
                body
            };
            return Err(RefreshFailed::new(Some(status.as_u16()), message));
        }

        let data: RefreshResponse = response
            .json()
            .await
            .map_err(|e| RefreshFailed::new(None, format!("malformed refresh response: {e}")))?;

        if data.access.is_empty() {
            return Err(RefreshFailed::new(
                None,
                "refresh response does not contain an access token",
            ));
        }

        tracing::info!("access token refreshed");
        Ok(data.access)
    }
}

/// Returns the coordinator to IDLE exactly once, on settle or on drop.
struct FlightGuard<'a> {
    state: &'a Mutex<FlightState>,
}

impl FlightGuard<'_> {
    /// Normal completion: flip to IDLE and hand the queued waiters back to the
    /// flight owner for fan-out.
    fn settle(self) -> Vec<Waiter> {
        let waiters = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.refreshing = false;
            std::mem::take(&mut state.waiters)
        };
        std::mem::forget(self);
        waiters
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        // Reached only when the flight never settled (task cancelled or
        // panicked mid-refresh). Leave the state reusable and fail the queue.
        let waiters = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.refreshing = false;
            std::mem::take(&mut state.waiters)
        };
        for waiter in waiters {
            let _ = waiter.send(Err(RefreshFailed::new(
                None,
                "refresh aborted before completion",
            )));
        }
    }
}
