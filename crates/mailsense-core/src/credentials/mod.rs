//! OAuth credential persistence
//!
//! One credential record exists per deployment. This module provides the
//! storage abstraction plus the merge semantics applied after token
//! refreshes: fields absent from a partial update keep their prior values,
//! so a refresh response without a rotated refresh token never erases the
//! stored one.

mod file;

pub use file::FileCredentialStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::Config;
use crate::error::{Error, Result};

/// OAuth2 token bundle persisted as a single JSON record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Access token for API calls
    pub access_token: String,

    /// Refresh token for obtaining new access tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Access token expiry timestamp (Unix seconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,

    /// Granted scopes, space separated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Token type, normally "Bearer"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl Credential {
    /// Check if the access token is expired or will expire soon.
    /// A record without a stored expiry is never considered expired here;
    /// staleness is then the provider's to report.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            // Consider expired if less than 5 minutes remaining
            Some(expires_at) => expires_at < chrono::Utc::now().timestamp() + 300,
            None => false,
        }
    }

    /// Presence check used by the session layer
    pub fn has_access_token(&self) -> bool {
        !self.access_token.is_empty()
    }

    /// Overlay a partial update onto this record. Absent update fields keep
    /// the prior value; notably an omitted `refresh_token` is preserved.
    pub fn merged_with(&self, update: &CredentialUpdate) -> Credential {
        Credential {
            access_token: update
                .access_token
                .clone()
                .unwrap_or_else(|| self.access_token.clone()),
            refresh_token: update
                .refresh_token
                .clone()
                .or_else(|| self.refresh_token.clone()),
            expires_at: update.expires_at.or(self.expires_at),
            scope: update.scope.clone().or_else(|| self.scope.clone()),
            token_type: update
                .token_type
                .clone()
                .or_else(|| self.token_type.clone()),
        }
    }
}

/// Partial credential update, typically produced by a token refresh
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialUpdate {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
    pub scope: Option<String>,
    pub token_type: Option<String>,
}

impl CredentialUpdate {
    /// Build the initial record from this update; requires an access token
    fn into_initial_credential(self) -> Result<Credential> {
        let access_token = self.access_token.ok_or_else(|| {
            Error::Credential("cannot merge into empty store without an access token".to_string())
        })?;
        Ok(Credential {
            access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_at,
            scope: self.scope,
            token_type: self.token_type,
        })
    }
}

/// Trait for credential storage backends
///
/// Implementations must be thread-safe (`Send + Sync`) and must serialize
/// writes internally: concurrent refresh results may race, and the record
/// on disk has to stay a whole, valid JSON object (last writer wins).
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load the persisted record; absence is not an error
    async fn load(&self) -> Result<Option<Credential>>;

    /// Atomically overwrite the persisted record
    async fn save(&self, credential: &Credential) -> Result<()>;

    /// Apply a partial update onto the persisted record and return the
    /// merged result. With no prior record the update must carry an access
    /// token and becomes the initial record.
    async fn merge(&self, update: &CredentialUpdate) -> Result<Credential>;

    /// Remove the persisted record; used by explicit invalidation only
    async fn delete(&self) -> Result<()>;

    /// Check whether a record exists
    async fn has_credential(&self) -> bool {
        self.load().await.map(|c| c.is_some()).unwrap_or(false)
    }
}

/// Create a credential store based on configuration
pub fn create_credential_store(config: &Config) -> Arc<dyn CredentialStore> {
    Arc::new(FileCredentialStore::new(config.credentials.path.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_credential() -> Credential {
        Credential {
            access_token: "at-1".to_string(),
            refresh_token: Some("rt-1".to_string()),
            expires_at: Some(chrono::Utc::now().timestamp() + 3600),
            scope: Some("email".to_string()),
            token_type: Some("Bearer".to_string()),
        }
    }

    #[test]
    fn test_merge_preserves_refresh_token() {
        let current = sample_credential();
        let update = CredentialUpdate {
            access_token: Some("at-2".to_string()),
            expires_at: Some(chrono::Utc::now().timestamp() + 7200),
            ..Default::default()
        };

        let merged = current.merged_with(&update);
        assert_eq!(merged.access_token, "at-2");
        assert_eq!(merged.refresh_token.as_deref(), Some("rt-1"));
        assert_eq!(merged.scope.as_deref(), Some("email"));
        assert_eq!(merged.token_type.as_deref(), Some("Bearer"));
    }

    #[test]
    fn test_merge_takes_rotated_refresh_token() {
        let current = sample_credential();
        let update = CredentialUpdate {
            access_token: Some("at-2".to_string()),
            refresh_token: Some("rt-2".to_string()),
            ..Default::default()
        };

        let merged = current.merged_with(&update);
        assert_eq!(merged.refresh_token.as_deref(), Some("rt-2"));
    }

    #[test]
    fn test_empty_update_is_identity() {
        let current = sample_credential();
        let merged = current.merged_with(&CredentialUpdate::default());
        assert_eq!(merged, current);
    }

    #[test]
    fn test_expiry_grace_window() {
        let mut credential = sample_credential();
        assert!(!credential.is_expired());

        credential.expires_at = Some(chrono::Utc::now().timestamp() + 60);
        assert!(credential.is_expired());

        credential.expires_at = None;
        assert!(!credential.is_expired());
    }

    #[tokio::test]
    async fn test_store_factory() {
        let config = Config::default();
        let store = create_credential_store(&config);
        // A fresh store answers existence probes without error
        let _ = store.has_credential().await;
    }
}
