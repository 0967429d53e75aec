// Wire types for the Paragraphs API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Login request body
#[derive(Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Successful login answer. The refresh token travels separately as an
/// HttpOnly cookie and never appears in the body.
#[derive(Deserialize, Debug)]
pub struct LoginResponse {
    pub access: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Registration request body. `date_of_birth` is `YYYY-MM-DD`.
#[derive(Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub date_of_birth: String,
}

/// Answer from the token refresh endpoint
#[derive(Deserialize, Debug)]
pub struct RefreshResponse {
    pub access: String,
}

/// Authenticated user info from `/api/auth/me/`
#[derive(Deserialize, Debug, Clone)]
pub struct UserInfo {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<String>,
}

/// One stored paragraph as returned by `/api/paragraphs/`
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Paragraph {
    #[serde(default)]
    pub id: Option<i64>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Submission body for `/api/paragraphs/`
#[derive(Serialize)]
pub struct SubmitRequest {
    pub content: String,
}

/// `202 Accepted` answer to a submission. The paragraphs themselves are
/// indexed asynchronously and only become visible in the list later.
#[derive(Deserialize, Debug)]
pub struct SubmitAccepted {
    #[serde(default)]
    pub task_id: Option<String>,
}

/// One search hit: paragraph content plus the character offsets at which the
/// query term occurs. Offsets index into the original content string, not any
/// rendered form.
#[derive(Deserialize, Debug, Clone)]
pub struct SearchHit {
    #[serde(default)]
    pub id: Option<i64>,
    pub content: String,
    #[serde(default)]
    pub positions: Vec<usize>,
    #[serde(default)]
    pub match_count: u32,
    pub created_at: DateTime<Utc>,
}

/// Paginated search envelope from `/api/paragraphs/search/`
#[derive(Deserialize, Debug)]
pub struct SearchResponse {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<SearchHit>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_paragraph_list() {
        let body = r#"[
            {"id": 7, "content": "first", "word_counts": {}, "created_at": "2025-06-01T10:30:00Z"},
            {"id": 8, "content": "second", "created_at": "2025-06-02T08:00:00Z"}
        ]"#;

        let paragraphs: Vec<Paragraph> = serde_json::from_str(body).unwrap();
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraphs[0].id, Some(7));
        assert_eq!(paragraphs[0].content, "first");
        // Unknown server-side fields (word_counts) are ignored
        assert_eq!(paragraphs[1].content, "second");
    }

    #[test]
    fn test_parse_search_response() {
        let body = r#"{
            "count": 1,
            "next": null,
            "previous": null,
            "results": [
                {
                    "id": 3,
                    "content": "the quick brown fox",
                    "positions": [4, 10],
                    "match_count": 2,
                    "created_at": "2025-06-01T10:30:00Z"
                }
            ]
        }"#;

        let response: SearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.count, 1);
        assert!(response.next.is_none());
        assert_eq!(response.results[0].positions, vec![4, 10]);
        assert_eq!(response.results[0].match_count, 2);
    }

    #[test]
    fn test_parse_submit_accepted() {
        let accepted: SubmitAccepted =
            serde_json::from_str(r#"{"task_id": "9f31b7c0"}"#).unwrap();
        assert_eq!(accepted.task_id.as_deref(), Some("9f31b7c0"));

        // Older deployments answered an empty body object
        let accepted: SubmitAccepted = serde_json::from_str("{}").unwrap();
        assert!(accepted.task_id.is_none());
    }

    #[test]
    fn test_parse_login_response_without_name() {
        let login: LoginResponse = serde_json::from_str(r#"{"access": "tok"}"#).unwrap();
        assert_eq!(login.access, "tok");
        assert!(login.name.is_none());
    }
}
