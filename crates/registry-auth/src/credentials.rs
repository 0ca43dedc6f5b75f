//! Credential storage for the active session
//!
//! Holds the access/refresh token pair as string entries under fixed keys,
//! the way the browser dashboard kept them in local storage. A file-backed
//! store survives restarts; writes use atomic temp-file + rename. A tokio
//! Mutex serializes writes from concurrent requests and refreshes.
//!
//! Both entries are cleared together on logout or refresh failure.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::constants::{ACCESS_KEY, REFRESH_KEY};
use crate::error::{Error, Result};

/// An access/refresh token pair as returned by the login endpoint.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access", &"[REDACTED]")
            .field("refresh", &"[REDACTED]")
            .finish()
    }
}

/// Persisted key-value store for the session's credentials.
///
/// `path` is `None` for an in-memory store (tests, one-shot tools).
pub struct CredentialStore {
    path: Option<PathBuf>,
    state: Mutex<HashMap<String, String>>,
}

impl CredentialStore {
    /// Load credentials from the given file path.
    ///
    /// If the file doesn't exist, creates it as `{}` (logged out).
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading credential file: {e}")))?;
            let entries: HashMap<String, String> = serde_json::from_str(&contents)
                .map_err(|e| Error::CredentialParse(format!("parsing credential file: {e}")))?;
            info!(
                path = %path.display(),
                has_access = entries.contains_key(ACCESS_KEY),
                has_refresh = entries.contains_key(REFRESH_KEY),
                "loaded credentials"
            );
            entries
        } else {
            info!(path = %path.display(), "credential file not found, starting logged out");
            let entries = HashMap::new();
            write_atomic(&path, &entries).await?;
            entries
        };

        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
        })
    }

    /// A store that lives only as long as this value.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(HashMap::new()),
        }
    }

    pub async fn access_token(&self) -> Option<String> {
        self.state.lock().await.get(ACCESS_KEY).cloned()
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.state.lock().await.get(REFRESH_KEY).cloned()
    }

    /// Both tokens, or `None` unless both are present.
    pub async fn tokens(&self) -> Option<TokenPair> {
        let state = self.state.lock().await;
        Some(TokenPair {
            access: state.get(ACCESS_KEY)?.clone(),
            refresh: state.get(REFRESH_KEY)?.clone(),
        })
    }

    pub async fn set_access(&self, access: String) -> Result<()> {
        self.put(&[(ACCESS_KEY, access)]).await
    }

    pub async fn set_refresh(&self, refresh: String) -> Result<()> {
        self.put(&[(REFRESH_KEY, refresh)]).await
    }

    /// Replace both tokens in a single write.
    pub async fn set_tokens(&self, pair: TokenPair) -> Result<()> {
        self.put(&[(ACCESS_KEY, pair.access), (REFRESH_KEY, pair.refresh)])
            .await
    }

    /// Remove both tokens in a single write.
    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.remove(ACCESS_KEY);
        state.remove(REFRESH_KEY);
        debug!("cleared credentials");
        self.persist(&state).await
    }

    async fn put(&self, entries: &[(&str, String)]) -> Result<()> {
        let mut state = self.state.lock().await;
        for (key, value) in entries {
            state.insert((*key).to_owned(), value.clone());
        }
        debug!(keys = ?entries.iter().map(|(k, _)| *k).collect::<Vec<_>>(), "stored credentials");
        self.persist(&state).await
    }

    async fn persist(&self, state: &HashMap<String, String>) -> Result<()> {
        match &self.path {
            Some(path) => write_atomic(path, state).await,
            None => Ok(()),
        }
    }
}

/// Write the entries to `path` atomically with 0600 permissions.
async fn write_atomic(path: &Path, data: &HashMap<String, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::CredentialParse(format!("serializing credentials: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("credential path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".credentials.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp credential file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting credential file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp credential file: {e}")))?;

    debug!(path = %path.display(), "persisted credentials");
    Ok(())
}
