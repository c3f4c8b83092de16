//! Token Storage
//!
//! Key-value persistence for issued tokens. The grant engine only ever does a
//! blind `set`; there is no compare-and-swap.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::AccessToken;
use crate::{Error, Result};

/// Durable key-value store for access tokens
pub trait TokenStore: Send + Sync {
    /// Store `token` under `key`, overwriting any previous value
    fn set(&self, key: &str, token: &AccessToken) -> Result<()>;

    /// Load the token stored under `key`
    fn get(&self, key: &str) -> Result<Option<AccessToken>>;

    /// Remove the token stored under `key` (no-op when absent)
    fn delete(&self, key: &str) -> Result<()>;
}

/// Process-local token store
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<HashMap<String, AccessToken>>,
}

impl MemoryTokenStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tokens
    pub fn len(&self) -> usize {
        self.tokens.read().len()
    }

    /// Whether the store holds no tokens
    pub fn is_empty(&self) -> bool {
        self.tokens.read().is_empty()
    }
}

impl TokenStore for MemoryTokenStore {
    fn set(&self, key: &str, token: &AccessToken) -> Result<()> {
        self.tokens.write().insert(key.to_string(), token.clone());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<AccessToken>> {
        Ok(self.tokens.read().get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.tokens.write().remove(key);
        Ok(())
    }
}

/// Token store persisting one JSON file per key
#[derive(Debug)]
pub struct FileTokenStore {
    /// Base directory for token storage
    base_dir: PathBuf,
}

impl FileTokenStore {
    /// Create a new token store with the given base directory
    pub fn new(base_dir: PathBuf) -> Result<Self> {
        if !base_dir.exists() {
            fs::create_dir_all(&base_dir)
                .map_err(|e| Error::Storage(format!("Failed to create token storage dir: {e}")))?;
        }

        Ok(Self { base_dir })
    }

    /// Create token storage in the default location (~/.oauth2-grant/tokens)
    pub fn default_location() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Storage("Cannot determine home directory".to_string()))?;

        Self::new(home.join(".oauth2-grant").join("tokens"))
    }

    /// Directory holding the token files
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Keys are hashed so arbitrary client identifiers map to safe file names
    fn token_path(&self, key: &str) -> PathBuf {
        let hash = Sha256::digest(key.as_bytes());
        let name = URL_SAFE_NO_PAD.encode(&hash[..12]);
        self.base_dir.join(format!("{name}.json"))
    }
}

impl TokenStore for FileTokenStore {
    fn set(&self, key: &str, token: &AccessToken) -> Result<()> {
        let path = self.token_path(key);

        let content = serde_json::to_string_pretty(token)?;
        write_private(&path, content.as_bytes())
            .map_err(|e| Error::Storage(format!("Failed to write token file: {e}")))?;

        info!(key = %key, "Saved OAuth2 token");
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<AccessToken>> {
        let path = self.token_path(key);

        if !path.exists() {
            debug!(key = %key, "No stored token found");
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| Error::Storage(format!("Failed to read token file: {e}")))?;

        match serde_json::from_str::<AccessToken>(&content) {
            Ok(token) => {
                debug!(key = %key, expired = token.is_expired(), "Loaded stored token");
                Ok(Some(token))
            }
            Err(e) => {
                // A corrupt file behaves like a missing token so the next grant overwrites it
                warn!(key = %key, error = %e, "Failed to parse stored token");
                Ok(None)
            }
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.token_path(key);

        if path.exists() {
            fs::remove_file(&path)
                .map_err(|e| Error::Storage(format!("Failed to delete token file: {e}")))?;
            info!(key = %key, "Deleted OAuth2 token");
        }

        Ok(())
    }
}

/// Write `content` to a file only the owner can read, tightening the mode of a
/// file left behind with looser permissions
fn write_private(path: &Path, content: &[u8]) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(content)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_last_write_wins() {
        let store = MemoryTokenStore::new();
        store.set("k", &AccessToken::new("first")).unwrap();
        store.set("k", &AccessToken::new("second")).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("k").unwrap().unwrap().access_token, "second");
    }

    #[test]
    fn memory_store_delete() {
        let store = MemoryTokenStore::new();
        store.set("k", &AccessToken::new("t")).unwrap();
        store.delete("k").unwrap();
        store.delete("k").unwrap();
        assert!(store.is_empty());
        assert!(store.get("k").unwrap().is_none());
    }

    #[test]
    fn file_store_round_trip_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("tokens")).unwrap();

        assert!(store.get("oauth2_client_access_token-a").unwrap().is_none());

        let token = AccessToken::from_response(
            "abc".to_string(),
            None,
            Some("refresh".to_string()),
            Some(3600),
            Some("read".to_string()),
        );
        store.set("oauth2_client_access_token-a", &token).unwrap();
        assert_eq!(store.get("oauth2_client_access_token-a").unwrap(), Some(token));

        store
            .set("oauth2_client_access_token-a", &AccessToken::new("xyz"))
            .unwrap();
        let loaded = store.get("oauth2_client_access_token-a").unwrap().unwrap();
        assert_eq!(loaded.access_token, "xyz");
        assert!(loaded.refresh_token.is_none());
    }

    #[test]
    fn file_store_keys_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().to_path_buf()).unwrap();

        store.set("a", &AccessToken::new("for-a")).unwrap();
        store.set("b", &AccessToken::new("for-b")).unwrap();
        store.delete("a").unwrap();

        assert!(store.get("a").unwrap().is_none());
        assert_eq!(store.get("b").unwrap().unwrap().access_token, "for-b");
    }

    #[test]
    fn corrupt_file_reads_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().to_path_buf()).unwrap();
        fs::write(store.token_path("bad"), "not json").unwrap();

        assert!(store.get("bad").unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn file_store_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().to_path_buf()).unwrap();
        store.set("k", &AccessToken::new("t")).unwrap();

        let mode = fs::metadata(store.token_path("k")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn file_store_tightens_existing_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().to_path_buf()).unwrap();
        let path = store.token_path("k");
        fs::write(&path, "{}").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        store.set("k", &AccessToken::new("t")).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(store.get("k").unwrap().unwrap().access_token, "t");
    }

    #[test]
    fn unwritable_location_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "").unwrap();

        let err = FileTokenStore::new(blocker.join("tokens")).unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }
}
