//! Session lifecycle for the single authenticated user
//!
//! The `SessionManager` is built once at process start and shared by
//! reference; there is no lazily created global handle. It owns the current
//! credential, re-derives it from the store on demand, and performs the
//! explicit refresh-then-merge sequence before provider calls when the
//! stored token is about to expire.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::credentials::{Credential, CredentialStore};
use crate::error::{Error, Result};
use crate::models::Profile;
use crate::oauth::OAuthClient;

/// Authentication lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No usable credential
    Unauthenticated,
    /// Authorization URL issued, waiting for the provider callback
    PendingCallback,
    /// A credential with an access token is bound
    Authenticated,
}

impl AuthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthState::Unauthenticated => "unauthenticated",
            AuthState::PendingCallback => "pending_callback",
            AuthState::Authenticated => "authenticated",
        }
    }
}

/// Owns the credential handle for the lifetime of the process
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    oauth: OAuthClient,
    current: RwLock<Option<Credential>>,
    state: RwLock<AuthState>,
    pending_state: RwLock<Option<String>>,
}

impl SessionManager {
    /// Create a session context over a credential store and OAuth client
    pub fn new(store: Arc<dyn CredentialStore>, oauth: OAuthClient) -> Self {
        Self {
            store,
            oauth,
            current: RwLock::new(None),
            state: RwLock::new(AuthState::Unauthenticated),
            pending_state: RwLock::new(None),
        }
    }

    /// Idempotent re-initialization: re-load the persisted credential into
    /// the handle. A record refreshed or replaced by another process takes
    /// effect here without constructing a new session.
    pub async fn ensure_session(&self) -> Result<()> {
        let loaded = self.store.load().await?;

        let mut current = self.current.write();
        let mut state = self.state.write();
        match &loaded {
            Some(c) if c.has_access_token() => *state = AuthState::Authenticated,
            _ => {
                // Keep waiting for the callback if one is outstanding
                if *state != AuthState::PendingCallback {
                    *state = AuthState::Unauthenticated;
                }
            }
        }
        *current = loaded;
        Ok(())
    }

    /// True iff the handle holds a credential with a non-empty access
    /// token. Presence only; expiry is the provider's to detect.
    pub fn is_authenticated(&self) -> bool {
        self.current
            .read()
            .as_ref()
            .map(|c| c.has_access_token())
            .unwrap_or(false)
    }

    /// Current lifecycle state
    pub fn state(&self) -> AuthState {
        *self.state.read()
    }

    /// Start the authorization flow: returns the redirect URL and the CSRF
    /// state nonce embedded in it
    pub fn begin_authorization(&self) -> (String, String) {
        let nonce = Uuid::new_v4().to_string();
        let url = self.oauth.authorization_url(&nonce);
        *self.pending_state.write() = Some(nonce.clone());
        *self.state.write() = AuthState::PendingCallback;
        info!("Beginning authorization flow");
        (url, nonce)
    }

    /// Finish the authorization flow with the code from the provider
    /// callback. The full credential is saved before the state flips.
    pub async fn complete_authorization(
        &self,
        code: &str,
        state: Option<&str>,
    ) -> Result<Credential> {
        {
            let pending = self.pending_state.read();
            if let Some(expected) = pending.as_deref() {
                if state != Some(expected) {
                    return Err(Error::OAuth("authorization state mismatch".to_string()));
                }
            }
        }

        let credential = self.oauth.exchange_code(code).await?;
        self.store.save(&credential).await?;

        *self.current.write() = Some(credential.clone());
        *self.pending_state.write() = None;
        *self.state.write() = AuthState::Authenticated;
        info!("Authorization complete");
        Ok(credential)
    }

    /// Hand out an access token for a provider call, refreshing first when
    /// the stored token is expired and a refresh token is available
    pub async fn access_token(&self) -> Result<String> {
        self.ensure_session().await?;

        let credential = {
            let current = self.current.read();
            current.clone().ok_or(Error::AuthenticationRequired)?
        };
        if !credential.has_access_token() {
            return Err(Error::AuthenticationRequired);
        }

        if credential.is_expired() && credential.refresh_token.is_some() {
            debug!("Access token expired, refreshing before provider call");
            let refreshed = self.refresh().await?;
            return Ok(refreshed.access_token);
        }

        Ok(credential.access_token)
    }

    /// Explicit token refresh: one OAuth refresh grant followed by a store
    /// merge, so an omitted refresh token in the response keeps the stored
    /// one
    pub async fn refresh(&self) -> Result<Credential> {
        let credential = {
            let current = self.current.read();
            current.clone().ok_or(Error::AuthenticationRequired)?
        };

        let update = self.oauth.refresh(&credential).await?;
        let merged = self.store.merge(&update).await?;

        *self.current.write() = Some(merged.clone());
        *self.state.write() = AuthState::Authenticated;
        Ok(merged)
    }

    /// Drop the session: removes the persisted record and clears the
    /// handle. The only in-process path back to `Unauthenticated`.
    pub async fn invalidate(&self) -> Result<()> {
        self.store.delete().await?;
        *self.current.write() = None;
        *self.pending_state.write() = None;
        *self.state.write() = AuthState::Unauthenticated;
        info!("Session invalidated");
        Ok(())
    }

    /// Fetch the authenticated user's profile
    pub async fn fetch_profile(&self) -> Result<Profile> {
        let token = self.access_token().await?;
        self.oauth.fetch_userinfo(&token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OAuthConfig;
    use crate::credentials::CredentialUpdate;
    use async_trait::async_trait;

    struct MemoryStore {
        record: RwLock<Option<Credential>>,
    }

    impl MemoryStore {
        fn new(record: Option<Credential>) -> Arc<Self> {
            Arc::new(Self {
                record: RwLock::new(record),
            })
        }
    }

    #[async_trait]
    impl CredentialStore for MemoryStore {
        async fn load(&self) -> Result<Option<Credential>> {
            Ok(self.record.read().clone())
        }

        async fn save(&self, credential: &Credential) -> Result<()> {
            *self.record.write() = Some(credential.clone());
            Ok(())
        }

        async fn merge(&self, update: &CredentialUpdate) -> Result<Credential> {
            let merged = match self.record.read().clone() {
                Some(current) => current.merged_with(update),
                None => Credential {
                    access_token: update.access_token.clone().unwrap_or_default(),
                    refresh_token: update.refresh_token.clone(),
                    expires_at: update.expires_at,
                    scope: update.scope.clone(),
                    token_type: update.token_type.clone(),
                },
            };
            *self.record.write() = Some(merged.clone());
            Ok(merged)
        }

        async fn delete(&self) -> Result<()> {
            *self.record.write() = None;
            Ok(())
        }
    }

    fn oauth_client() -> OAuthClient {
        OAuthClient::new(OAuthConfig {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "http://localhost:5000/auth/google/callback".to_string(),
        })
    }

    fn credential(access: &str) -> Credential {
        Credential {
            access_token: access.to_string(),
            refresh_token: Some("rt".to_string()),
            expires_at: Some(chrono::Utc::now().timestamp() + 3600),
            scope: None,
            token_type: Some("Bearer".to_string()),
        }
    }

    #[tokio::test]
    async fn test_empty_store_is_unauthenticated() {
        let session = SessionManager::new(MemoryStore::new(None), oauth_client());
        session.ensure_session().await.unwrap();
        assert!(!session.is_authenticated());
        assert_eq!(session.state(), AuthState::Unauthenticated);
        assert!(matches!(
            session.access_token().await,
            Err(Error::AuthenticationRequired)
        ));
    }

    #[tokio::test]
    async fn test_ensure_session_picks_up_external_record() {
        let store = MemoryStore::new(None);
        let session = SessionManager::new(store.clone(), oauth_client());
        session.ensure_session().await.unwrap();
        assert!(!session.is_authenticated());

        // Another process writes a credential behind our back
        store.save(&credential("at-ext")).await.unwrap();

        session.ensure_session().await.unwrap();
        assert!(session.is_authenticated());
        assert_eq!(session.state(), AuthState::Authenticated);
        assert_eq!(session.access_token().await.unwrap(), "at-ext");
    }

    #[tokio::test]
    async fn test_begin_authorization_moves_to_pending() {
        let session = SessionManager::new(MemoryStore::new(None), oauth_client());
        let (url, nonce) = session.begin_authorization();
        assert_eq!(session.state(), AuthState::PendingCallback);
        assert!(url.contains(&nonce));

        // Re-loading an empty store keeps the pending state
        session.ensure_session().await.unwrap();
        assert_eq!(session.state(), AuthState::PendingCallback);
    }

    #[tokio::test]
    async fn test_callback_state_mismatch_is_rejected() {
        let session = SessionManager::new(MemoryStore::new(None), oauth_client());
        let (_, nonce) = session.begin_authorization();

        let result = session
            .complete_authorization("code", Some("not-the-nonce"))
            .await;
        assert!(result.is_err());
        assert_ne!(nonce, "not-the-nonce");
        assert_eq!(session.state(), AuthState::PendingCallback);
    }

    #[tokio::test]
    async fn test_stale_token_without_refresh_token_is_handed_out() {
        // Presence check only: an expired token with no refresh token is
        // still handed to the provider, which reports staleness itself
        let mut stale = credential("at-stale");
        stale.refresh_token = None;
        stale.expires_at = Some(chrono::Utc::now().timestamp() - 100);

        let session = SessionManager::new(MemoryStore::new(Some(stale)), oauth_client());
        session.ensure_session().await.unwrap();
        assert!(session.is_authenticated());
        assert_eq!(session.access_token().await.unwrap(), "at-stale");
    }

    #[tokio::test]
    async fn test_invalidate_clears_store_and_state() {
        let store = MemoryStore::new(Some(credential("at-1")));
        let session = SessionManager::new(store.clone(), oauth_client());
        session.ensure_session().await.unwrap();
        assert!(session.is_authenticated());

        session.invalidate().await.unwrap();
        assert!(!session.is_authenticated());
        assert_eq!(session.state(), AuthState::Unauthenticated);
        assert_eq!(store.load().await.unwrap(), None);

        // Re-loading after invalidation stays unauthenticated
        session.ensure_session().await.unwrap();
        assert!(!session.is_authenticated());
    }
}
