// Session-scoped credential storage

use tokio::sync::RwLock;

/// Holds the access token and display name for the lifetime of the process
/// session, the way a browser page keeps them in session storage. Nothing is
/// ever written to disk.
///
/// The store itself does not serialize writers; the refresh coordinator's
/// single-flight discipline guarantees only one logical writer mutates the
/// token at a time.
#[derive(Default)]
pub struct CredentialStore {
    access_token: RwLock<Option<String>>,
    display_name: RwLock<Option<String>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current access token, if a session is active
    pub async fn access_token(&self) -> Option<String> {
        self.access_token.read().await.clone()
    }

    /// Replace the current access token. Requests already in flight with the
    /// previous value are unaffected.
    pub async fn set_access_token(&self, token: impl Into<String>) {
        let mut guard = self.access_token.write().await;
        *guard = Some(token.into());
    }

    pub async fn display_name(&self) -> Option<String> {
        self.display_name.read().await.clone()
    }

    pub async fn set_display_name(&self, name: impl Into<String>) {
        let mut guard = self.display_name.write().await;
        *guard = Some(name.into());
    }

    pub async fn is_authenticated(&self) -> bool {
        self.access_token.read().await.is_some()
    }

    /// Drop the whole session (explicit logout)
    pub async fn clear(&self) {
        let mut token = self.access_token.write().await;
        let mut name = self.display_name.write().await;
        *token = None;
        *name = None;
    }
}
