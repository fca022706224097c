//! File-based credential store
//!
//! Stores the single credential record as JSON at a fixed path
//! (default ~/.mailsense/credentials.json).

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Result;

use super::{Credential, CredentialStore, CredentialUpdate};

/// File-based credential store
///
/// All mutations go through one internal mutex, so overlapping refresh
/// results are applied one at a time and the file is always replaced as a
/// whole (written to a temp file, then renamed into place).
pub struct FileCredentialStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCredentialStore {
    /// Create a store backed by the given file path
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the persisted record
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    async fn read_record(&self) -> Result<Option<Credential>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let credential: Credential = serde_json::from_str(&contents)?;
                Ok(Some(credential))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No credential record at {:?}", self.path);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write_record(&self, credential: &Credential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let data = serde_json::to_string_pretty(credential)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!("Wrote credential record to {:?}", self.path);
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<Credential>> {
        self.read_record().await
    }

    async fn save(&self, credential: &Credential) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write_record(credential).await
    }

    async fn merge(&self, update: &CredentialUpdate) -> Result<Credential> {
        // Hold the lock across read and write so two refreshes cannot
        // interleave and drop each other's fields
        let _guard = self.write_lock.lock().await;

        let merged = match self.read_record().await? {
            Some(current) => current.merged_with(update),
            None => update.clone().into_initial_credential()?,
        };

        self.write_record(&merged).await?;
        Ok(merged)
    }

    async fn delete(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> FileCredentialStore {
        FileCredentialStore::new(dir.path().join("credentials.json"))
    }

    fn credential(access: &str, refresh: Option<&str>) -> Credential {
        Credential {
            access_token: access.to_string(),
            refresh_token: refresh.map(String::from),
            expires_at: Some(1_700_000_000),
            scope: Some("gmail.readonly".to_string()),
            token_type: Some("Bearer".to_string()),
        }
    }

    #[tokio::test]
    async fn test_load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.load().await.unwrap(), None);
        assert!(!store.has_credential().await);
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let saved = credential("at-1", Some("rt-1"));
        store.save(&saved).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, saved);
        assert!(store.has_credential().await);
    }

    #[tokio::test]
    async fn test_merge_preserves_absent_refresh_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.save(&credential("at-1", Some("rt-1"))).await.unwrap();

        let update = CredentialUpdate {
            access_token: Some("at-2".to_string()),
            expires_at: Some(1_800_000_000),
            ..Default::default()
        };
        let merged = store.merge(&update).await.unwrap();
        assert_eq!(merged.access_token, "at-2");
        assert_eq!(merged.refresh_token.as_deref(), Some("rt-1"));

        // The persisted record matches what merge returned
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, merged);
    }

    #[tokio::test]
    async fn test_merge_into_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let update = CredentialUpdate {
            access_token: Some("at-1".to_string()),
            refresh_token: Some("rt-1".to_string()),
            ..Default::default()
        };
        let merged = store.merge(&update).await.unwrap();
        assert_eq!(merged.access_token, "at-1");
        assert_eq!(store.load().await.unwrap().unwrap(), merged);
    }

    #[tokio::test]
    async fn test_merge_into_empty_store_needs_access_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let update = CredentialUpdate {
            refresh_token: Some("rt-1".to_string()),
            ..Default::default()
        };
        assert!(store.merge(&update).await.is_err());
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.save(&credential("at-1", None)).await.unwrap();

        store.delete().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);

        // Deleting again is fine
        store.delete().await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_merges_keep_record_whole() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(store_in(&dir));
        store.save(&credential("at-0", Some("rt-0"))).await.unwrap();

        let a = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .merge(&CredentialUpdate {
                        access_token: Some("at-a".to_string()),
                        ..Default::default()
                    })
                    .await
            })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .merge(&CredentialUpdate {
                        access_token: Some("at-b".to_string()),
                        ..Default::default()
                    })
                    .await
            })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        // Last writer wins, refresh token survives either ordering
        let loaded = store.load().await.unwrap().unwrap();
        assert!(loaded.access_token == "at-a" || loaded.access_token == "at-b");
        assert_eq!(loaded.refresh_token.as_deref(), Some("rt-0"));
    }
}
