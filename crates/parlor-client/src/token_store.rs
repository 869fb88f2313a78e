//! Client-side persistence for the access/refresh token pair.
//!
//! Entries carry an absolute expiry. An expired entry reads as absent,
//! which is all the expiry policy there is: nothing refreshes tokens, so
//! once they lapse the next authenticated call fails and the user logs in
//! again.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use parlor_types::TokenPair;

use crate::error::Result;

pub trait TokenStore: Send + Sync {
    /// The stored pair, or `None` if nothing is stored or it has expired.
    fn load(&self) -> Result<Option<TokenPair>>;

    /// Replace whatever is stored with `tokens`, restarting the expiry clock.
    fn save(&self, tokens: &TokenPair) -> Result<()>;

    /// Remove both tokens.
    fn clear(&self) -> Result<()>;

    fn access_token(&self) -> Result<Option<String>> {
        Ok(self.load()?.map(|t| t.access_token))
    }

    fn refresh_token(&self) -> Result<Option<String>> {
        Ok(self.load()?.map(|t| t.refresh_token))
    }
}

/// On-disk record: the tokens plus the moment they stop being valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredTokens {
    #[serde(flatten)]
    tokens: TokenPair,
    expires_at: DateTime<Utc>,
}

impl StoredTokens {
    fn new(tokens: &TokenPair, ttl: TimeDelta) -> Self {
        Self {
            tokens: tokens.clone(),
            expires_at: Utc::now() + ttl,
        }
    }

    fn live(self) -> Option<TokenPair> {
        if Utc::now() < self.expires_at {
            Some(self.tokens)
        } else {
            None
        }
    }
}

// ── File store ──────────────────────────────────────────────────────────

/// JSON file store, the terminal counterpart of a cookie jar.
pub struct FileTokenStore {
    path: PathBuf,
    ttl: TimeDelta,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>, ttl: TimeDelta) -> Self {
        Self {
            path: path.into(),
            ttl,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Option<StoredTokens>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&raw) {
            Ok(stored) => Ok(Some(stored)),
            Err(e) => {
                // A corrupt file is treated like a missing cookie.
                warn!("Ignoring unreadable token file {}: {}", self.path.display(), e);
                Ok(None)
            }
        }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<TokenPair>> {
        let tokens = self.read()?.and_then(StoredTokens::live);
        if tokens.is_none() {
            debug!("No live tokens in {}", self.path.display());
        }
        Ok(tokens)
    }

    fn save(&self, tokens: &TokenPair) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let body = serde_json::to_vec_pretty(&StoredTokens::new(tokens, self.ttl))?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path)?;
        // `mode` only applies on creation; tighten a file that already existed.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))?;
        }
        file.write_all(&body)?;
        file.sync_all()?;

        debug!("Saved tokens to {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ── Memory store ────────────────────────────────────────────────────────

/// Process-local store. Used by tests and by embedders that keep tokens in
/// their own secure storage.
pub struct MemoryTokenStore {
    inner: Mutex<Option<StoredTokens>>,
    ttl: TimeDelta,
}

impl MemoryTokenStore {
    pub fn new(ttl: TimeDelta) -> Self {
        Self {
            inner: Mutex::new(None),
            ttl,
        }
    }

    pub fn with_tokens(tokens: TokenPair, ttl: TimeDelta) -> Self {
        Self {
            inner: Mutex::new(Some(StoredTokens::new(&tokens, ttl))),
            ttl,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<StoredTokens>> {
        // The guarded value is plain data; a panic elsewhere cannot leave it
        // half-written.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryTokenStore {
    fn default() -> Self {
        Self::new(TimeDelta::hours(crate::config::DEFAULT_TOKEN_TTL_HOURS))
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<TokenPair>> {
        Ok(self.lock().clone().and_then(StoredTokens::live))
    }

    fn save(&self, tokens: &TokenPair) -> Result<()> {
        *self.lock() = Some(StoredTokens::new(tokens, self.ttl));
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.lock() = None;
        Ok(())
    }
}
