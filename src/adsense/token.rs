use crate::error::{AppError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OAuthToken {
    pub access_token: String,
    pub refresh_token: String,
    pub expiry: DateTime<Utc>,
}

impl OAuthToken {
    /// Check if the access token is expired or about to expire (within 5 minutes)
    pub fn is_expired(&self) -> bool {
        self.expiry < Utc::now() + Duration::minutes(5)
    }
}

/// The cached token file. Holds at most one token.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the cached token. Anything that prevents reading it back is
    /// treated as a cache miss.
    pub fn load(&self) -> Option<OAuthToken> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                debug!(path = ?self.path, "No cached token: {}", e);
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(token) => Some(token),
            Err(e) => {
                debug!(path = ?self.path, "Ignoring unreadable cached token: {}", e);
                None
            }
        }
    }

    pub fn save(&self, token: &OAuthToken) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::Auth(format!("Failed to create token cache directory: {}", e))
            })?;
        }

        let contents = serde_json::to_string_pretty(token)?;

        let mut options = OpenOptions::new();
        options.create(true).write(true).truncate(true);
        // Owner-only, set at creation
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options
            .open(&self.path)
            .map_err(|e| AppError::Auth(format!("Failed to create token cache: {}", e)))?;
        file.write_all(contents.as_bytes())
            .map_err(|e| AppError::Auth(format!("Failed to write token cache: {}", e)))?;

        debug!(path = ?self.path, "Saved token");
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        if !self.path.exists() {
            debug!("No cached token to clear");
            return Ok(());
        }

        fs::remove_file(&self.path)
            .map_err(|e| AppError::Auth(format!("Failed to delete token cache: {}", e)))?;
        debug!(path = ?self.path, "Cleared cached token");

        Ok(())
    }
}
