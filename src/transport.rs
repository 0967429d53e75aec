// Authenticated HTTP transport
// Attaches the session bearer token and drives the single 401-triggered
// refresh-and-retry cycle.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Request, Response, StatusCode};
use serde::Serialize;

use crate::auth::{CredentialStore, RefreshCoordinator};
use crate::error::ApiError;

/// HTTP transport for the Paragraphs API.
///
/// One shared `reqwest::Client` carries the connection pool and the cookie
/// store; the login response's HttpOnly refresh cookie lands there and is what
/// credentials the refresh endpoint later.
pub struct AuthenticatedTransport {
    client: Client,
    store: Arc<CredentialStore>,
    refresher: Arc<RefreshCoordinator>,
    base_url: String,
}

impl AuthenticatedTransport {
    /// Build the transport and its session state for `base_url`.
    pub fn new(base_url: &str, connect_timeout: u64, request_timeout: u64) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();

        let client = Client::builder()
            .cookie_store(true)
            .connect_timeout(Duration::from_secs(connect_timeout))
            .timeout(Duration::from_secs(request_timeout))
            .build()
            .context("failed to build HTTP client")?;

        let store = Arc::new(CredentialStore::new());
        let refresher = Arc::new(RefreshCoordinator::new(
            store.clone(),
            client.clone(),
            format!("{base_url}/api/auth/token/refresh/"),
        ));

        Ok(Self {
            client,
            store,
            refresher,
            base_url,
        })
    }

    /// Session credential state shared with this transport
    pub fn store(&self) -> Arc<CredentialStore> {
        self.store.clone()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET `path` with session credentials and 401 recovery
    pub async fn get(&self, path: &str) -> Result<Response, ApiError> {
        let request = self.client.get(self.endpoint(path)).build()?;
        self.execute_internal(request, true).await
    }

    /// GET `path` with URL-encoded `query` pairs
    pub async fn get_with_query(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Response, ApiError> {
        let request = self.client.get(self.endpoint(path)).query(query).build()?;
        self.execute_internal(request, true).await
    }

    /// POST a JSON `body` to `path` with session credentials and 401 recovery
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<Response, ApiError> {
        let request = self.client.post(self.endpoint(path)).json(body).build()?;
        self.execute_internal(request, true).await
    }

    /// POST without the 401 recovery cycle. For login and registration, where
    /// a 401 is an authentication outcome to surface, not an expired session
    /// to repair.
    pub async fn post_json_no_retry<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<Response, ApiError> {
        let request = self.client.post(self.endpoint(path)).json(body).build()?;
        self.execute_internal(request, false).await
    }

    /// Execute `request`; when `recover_401` is set, a 401 answer triggers one
    /// coordinated refresh followed by exactly one retry. The retry's answer
    /// is final whatever its status; every non-401 status is the caller's to
    /// interpret.
    async fn execute_internal(
        &self,
        mut request: Request,
        recover_401: bool,
    ) -> Result<Response, ApiError> {
        // An empty store sends the request unauthenticated rather than failing
        if let Some(token) = self.store.access_token().await {
            request
                .headers_mut()
                .insert(AUTHORIZATION, bearer_value(&token)?);
        }

        let retry = request.try_clone();
        let method = request.method().clone();
        let url = request.url().clone();
        tracing::debug!(method = %method, url = %url, "sending request");

        let response = self.client.execute(request).await?;
        if response.status() != StatusCode::UNAUTHORIZED || !recover_401 {
            return Ok(response);
        }

        tracing::debug!(method = %method, url = %url, "got 401, running coordinated refresh");
        let Some(mut retry) = retry else {
            return Err(ApiError::Internal(anyhow!("request body is not cloneable")));
        };

        let token = self.refresher.refresh().await?;
        retry
            .headers_mut()
            .insert(AUTHORIZATION, bearer_value(&token)?);

        let response = self.client.execute(retry).await?;
        tracing::debug!(status = %response.status(), url = %url, "retry settled");
        Ok(response)
    }
}

fn bearer_value(token: &str) -> Result<reqwest::header::HeaderValue, ApiError> {
    format!("Bearer {token}")
        .parse()
        .map_err(|_| ApiError::Internal(anyhow!("access token is not a valid header value")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn transport_for(server: &mockito::ServerGuard) -> AuthenticatedTransport {
        AuthenticatedTransport::new(&server.url(), 5, 30).unwrap()
    }

    #[tokio::test]
    async fn test_attaches_bearer_from_store() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/paragraphs/")
            .match_header("authorization", "Bearer session-token")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let transport = transport_for(&server);
        transport.store().set_access_token("session-token").await;

        let response = transport.get("/api/paragraphs/").await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_store_sends_unauthenticated() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/paragraphs/")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let transport = transport_for(&server);
        let response = transport.get("/api/paragraphs/").await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_401_error_returned_without_refresh() {
        let mut server = mockito::Server::new_async().await;
        let paragraphs = server
            .mock("GET", "/api/paragraphs/")
            .with_status(503)
            .with_body("upstream down")
            .expect(1)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/api/auth/token/refresh/")
            .expect(0)
            .create_async()
            .await;

        let transport = transport_for(&server);
        transport.store().set_access_token("session-token").await;

        let response = transport.get("/api/paragraphs/").await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        paragraphs.assert_async().await;
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_401_refreshes_and_retries_once() {
        let mut server = mockito::Server::new_async().await;
        // The stale token is rejected, the refreshed one is accepted
        let rejected = server
            .mock("GET", "/api/paragraphs/")
            .match_header("authorization", "Bearer stale")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;
        let accepted = server
            .mock("GET", "/api/paragraphs/")
            .match_header("authorization", "Bearer fresh")
            .with_status(200)
            .with_body(r#"[{"id": 1, "content": "hello", "created_at": "2025-06-01T10:30:00Z"}]"#)
            .expect(1)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/api/auth/token/refresh/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access": "fresh"}"#)
            .expect(1)
            .create_async()
            .await;

        let transport = transport_for(&server);
        transport.store().set_access_token("stale").await;

        let response = transport.get("/api/paragraphs/").await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            transport.store().access_token().await.as_deref(),
            Some("fresh")
        );
        rejected.assert_async().await;
        accepted.assert_async().await;
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_retry_that_still_401s_is_final() {
        let mut server = mockito::Server::new_async().await;
        // Server rejects even the refreshed token; exactly one retry, no loop
        let paragraphs = server
            .mock("GET", "/api/paragraphs/")
            .with_status(401)
            .expect(2)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/api/auth/token/refresh/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access": "fresh"}"#)
            .expect(1)
            .create_async()
            .await;

        let transport = transport_for(&server);
        transport.store().set_access_token("stale").await;

        let response = transport.get("/api/paragraphs/").await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        paragraphs.assert_async().await;
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_refresh_propagates() {
        let mut server = mockito::Server::new_async().await;
        let paragraphs = server
            .mock("GET", "/api/paragraphs/")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;
        server
            .mock("POST", "/api/auth/token/refresh/")
            .with_status(401)
            .with_body(r#"{"error": "Invalid or expired refresh token"}"#)
            .create_async()
            .await;

        let transport = transport_for(&server);
        transport.store().set_access_token("stale").await;

        let err = transport.get("/api/paragraphs/").await.unwrap_err();
        assert!(matches!(err, ApiError::RefreshFailed(_)));
        // The stale credential stays; logout policy belongs to the caller
        assert_eq!(
            transport.store().access_token().await.as_deref(),
            Some("stale")
        );
        paragraphs.assert_async().await;
    }

    #[tokio::test]
    async fn test_no_retry_variant_returns_401_untouched() {
        let mut server = mockito::Server::new_async().await;
        let login = server
            .mock("POST", "/api/auth/login/")
            .with_status(401)
            .with_body(r#"{"detail": "Invalid credentials"}"#)
            .expect(1)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/api/auth/token/refresh/")
            .expect(0)
            .create_async()
            .await;

        let transport = transport_for(&server);
        let response = transport
            .post_json_no_retry(
                "/api/auth/login/",
                &serde_json::json!({"email": "a@b.c", "password": "nope"}),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        login.assert_async().await;
        refresh.assert_async().await;
    }
}
