// High-level operations against the Paragraphs API
// Typed wrappers over the authenticated transport, plus the post-write
// reconciliation entry point.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Response;
use serde_json::Value;

use crate::error::{ApiError, Result};
use crate::models::{
    LoginRequest, LoginResponse, Paragraph, RegisterRequest, SubmitAccepted, SubmitRequest,
    UserInfo,
};
use crate::reconcile::{self, PollConfig, PollOutcome};
use crate::transport::AuthenticatedTransport;

// Shape check only. "2024-13-40" passes here and is the server's to reject.
static DATE_SHAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

/// Client for the Paragraphs service
pub struct ParagraphsApi {
    transport: Arc<AuthenticatedTransport>,
    poll: PollConfig,
}

impl ParagraphsApi {
    pub fn new(transport: Arc<AuthenticatedTransport>, poll: PollConfig) -> Self {
        Self { transport, poll }
    }

    pub fn transport(&self) -> &Arc<AuthenticatedTransport> {
        &self.transport
    }

    /// Authenticate and start a session. On success the access token (and the
    /// refresh cookie, handled by the transport) are installed; returns the
    /// display name for the prompt.
    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };

        let response = self
            .transport
            .post_json_no_retry("/api/auth/login/", &body)
            .await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let data: LoginResponse = response.json().await?;
        let store = self.transport.store();
        store.set_access_token(data.access).await;

        let name = match data.name {
            Some(name) => name,
            // Older deployments omit the name from the login answer
            None => match self.me().await {
                Ok(user) => user.name,
                Err(e) => {
                    tracing::debug!(error = %e, "could not fetch user info after login");
                    email.to_string()
                }
            },
        };
        store.set_display_name(name.clone()).await;

        tracing::info!("session established");
        Ok(name)
    }

    /// Create an account. `date_of_birth` is checked for `YYYY-MM-DD` shape
    /// before anything is sent; calendar validity is the server's concern.
    pub async fn register(&self, request: &RegisterRequest) -> Result<()> {
        if !DATE_SHAPE.is_match(&request.date_of_birth) {
            return Err(ApiError::Validation(
                "date_of_birth must be in YYYY-MM-DD format".to_string(),
            ));
        }

        let response = self
            .transport
            .post_json_no_retry("/api/auth/register/", request)
            .await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        tracing::info!("account registered");
        Ok(())
    }

    /// Who the current session belongs to
    pub async fn me(&self) -> Result<UserInfo> {
        let response = self.transport.get("/api/auth/me/").await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(response.json().await?)
    }

    /// End the session. The server-side revocation is best-effort; the local
    /// credential state is always cleared.
    pub async fn logout(&self) {
        if let Err(e) = self.transport.post_json("/api/auth/logout/", &Value::Null).await {
            tracing::debug!(error = %e, "logout request failed");
        }
        self.transport.store().clear().await;
        tracing::info!("session cleared");
    }

    /// All stored paragraphs, newest first
    pub async fn list_paragraphs(&self) -> Result<Vec<Paragraph>> {
        let response = self.transport.get("/api/paragraphs/").await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let mut paragraphs: Vec<Paragraph> = response.json().await?;
        paragraphs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paragraphs)
    }

    /// Submit raw text for asynchronous indexing. The server splits the input
    /// on blank lines and acknowledges with 202 before anything is visible.
    pub async fn submit_paragraphs(&self, content: &str) -> Result<SubmitAccepted> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ApiError::Validation("content must not be empty".to_string()));
        }

        let body = SubmitRequest {
            content: content.to_string(),
        };
        let response = self.transport.post_json("/api/paragraphs/", &body).await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let accepted: SubmitAccepted = response.json().await.unwrap_or(SubmitAccepted {
            task_id: None,
        });
        tracing::debug!(task_id = ?accepted.task_id, "submission accepted");
        Ok(accepted)
    }

    /// Submit text, then poll the list until the write becomes visible or the
    /// attempt budget runs out. The pre-submit count is the baseline.
    pub async fn submit_and_wait(&self, content: &str) -> Result<PollOutcome> {
        let baseline = self.list_paragraphs().await?.len();
        self.submit_paragraphs(content).await?;

        let outcome =
            reconcile::poll_until_visible(|| self.list_paragraphs(), baseline, &self.poll).await;
        Ok(outcome)
    }

    /// Search stored paragraphs for a single term
    pub async fn search(&self, term: &str, page: u32) -> Result<crate::models::SearchResponse> {
        let term = term.trim();
        if term.is_empty() {
            return Err(ApiError::Validation("search term must not be empty".to_string()));
        }

        let response = self
            .transport
            .get_with_query(
                "/api/paragraphs/search/",
                &[("word", term), ("page", &page.to_string())],
            )
            .await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(response.json().await?)
    }
}

/// Turn a non-2xx answer into an `ApiError`, favoring the server's own
/// wording: `{detail}`, `{error}`, `{errors: {field: [msgs]}}` or a bare DRF
/// field map, falling back to the status line.
async fn error_from_response(response: Response) -> ApiError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let message = extract_error_message(&body)
        .unwrap_or_else(|| format!("request failed with status {status}"));

    ApiError::Api {
        status: status.as_u16(),
        message,
    }
}

fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;

    if let Some(detail) = value.get("detail").and_then(Value::as_str) {
        return Some(detail.to_string());
    }
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        return Some(error.to_string());
    }
    if let Some(errors) = value.get("errors") {
        if let Some(flat) = flatten_field_errors(errors) {
            return Some(flat);
        }
    }
    // DRF serializer errors arrive as a bare field map on 400
    flatten_field_errors(&value)
}

fn flatten_field_errors(value: &Value) -> Option<String> {
    let map = value.as_object()?;
    let mut messages = Vec::new();

    for field_errors in map.values() {
        match field_errors {
            Value::Array(list) => {
                messages.extend(list.iter().filter_map(Value::as_str).map(str::to_string));
            }
            Value::String(s) => messages.push(s.clone()),
            _ => {}
        }
    }

    if messages.is_empty() {
        None
    } else {
        Some(messages.join(" "))
    }
}
