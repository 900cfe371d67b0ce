//! File-backed token persistence.
//!
//! Tokens are stored as plain JSON files (one file per provider) so they
//! survive process restarts and device-code flows only run once. A store
//! that cannot be read is never fatal: a missing or corrupt file just
//! means the user re-authenticates.
//!
//! There is no cross-process locking; if two processes write the same
//! token file, the last writer wins.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::oauth::OAuthTokens;

/// Persists [`OAuthTokens`] to a JSON file on disk.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Create a store backed by the given file path. The file does not need
    /// to exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load persisted tokens.
    ///
    /// Returns `None` if the file does not exist or does not parse as a
    /// token record. A corrupt file is logged and treated as absent rather
    /// than failing the authentication attempt.
    pub async fn load(&self) -> Option<OAuthTokens> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to read token file");
                return None;
            }
        };

        match serde_json::from_slice::<OAuthTokens>(&data) {
            Ok(tokens) => Some(tokens),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "token file is corrupt, discarding it"
                );
                None
            }
        }
    }

    /// Persist tokens, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be written or a
    /// serialization error if the tokens cannot be encoded.
    pub async fn save(&self, tokens: &OAuthTokens) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let data = serde_json::to_vec_pretty(tokens)?;
        tokio::fs::write(&self.path, data).await?;

        tracing::debug!(path = %self.path.display(), "tokens persisted");
        Ok(())
    }

    /// Delete the persisted tokens. Deleting a store that was never saved
    /// is not an error.
    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_tokens() -> OAuthTokens {
        OAuthTokens {
            access_token: "access_tok_123".to_string(),
            refresh_token: Some("refresh_tok_456".to_string()),
            expires_at: Some(chrono::Utc::now().timestamp() + 3600),
            token_type: "Bearer".to_string(),
            scopes: vec!["Tasks.ReadWrite".to_string()],
        }
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("tokens.json"));

        store.save(&test_tokens()).await.unwrap();
        let loaded = store.load().await.unwrap();

        assert_eq!(loaded.access_token, "access_tok_123");
        assert_eq!(loaded.refresh_token.as_deref(), Some("refresh_tok_456"));
        assert_eq!(loaded.scopes, vec!["Tasks.ReadWrite"]);
    }

    #[tokio::test]
    async fn load_missing_file_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("nonexistent.json"));
        assert!(store.load().await.is_none());
    }

    #[tokio::test]
    async fn load_corrupt_file_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let store = TokenStore::new(&path);
        assert!(store.load().await.is_none());
    }

    #[tokio::test]
    async fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("nested/deeper/tokens.json"));

        store.save(&test_tokens()).await.unwrap();
        assert!(store.load().await.is_some());
    }

    #[tokio::test]
    async fn save_overwrites_existing() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("tokens.json"));

        store.save(&test_tokens()).await.unwrap();

        let mut updated = test_tokens();
        updated.access_token = "second".to_string();
        store.save(&updated).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.access_token, "second");
    }

    #[tokio::test]
    async fn clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("tokens.json"));

        store.save(&test_tokens()).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.load().await.is_none());
    }

    #[tokio::test]
    async fn clear_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("tokens.json"));
        store.clear().await.unwrap();
    }

    #[test]
    fn token_store_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TokenStore>();
    }
}
