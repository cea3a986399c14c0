use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_DIR_PREFIX: &str = "adsense-report-cli";
const CLIENT_SECRET_FILE: &str = "client_secret.json";
const TOKEN_CACHE_FILE: &str = "auth_cache.json";
const CREDENTIALS_HELP_URL: &str = "https://console.developers.google.com/project";

/// Resolved per-user locations, built once at startup and passed to whatever
/// needs them.
#[derive(Debug, Clone)]
pub struct Config {
    config_dir: PathBuf,
    cache_dir: PathBuf,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Layout of the JSON file downloaded from the Google API console. Web
/// clients use the `web` key, desktop clients use `installed`.
#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    web: Option<ClientCredentials>,
    installed: Option<ClientCredentials>,
}

impl Config {
    pub fn new() -> Result<Self> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix(CONFIG_DIR_PREFIX);

        let config_dir = xdg_dirs
            .get_config_home()
            .ok_or_else(|| AppError::Config("Failed to determine config directory".to_string()))?;
        let cache_dir = xdg_dirs
            .get_cache_home()
            .ok_or_else(|| AppError::Config("Failed to determine cache directory".to_string()))?;

        Ok(Self::from_dirs(config_dir, cache_dir))
    }

    pub fn from_dirs(config_dir: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            cache_dir: cache_dir.into(),
        }
    }

    pub fn client_secret_file(&self) -> PathBuf {
        self.config_dir.join(CLIENT_SECRET_FILE)
    }

    pub fn token_cache_file(&self) -> PathBuf {
        self.cache_dir.join(TOKEN_CACHE_FILE)
    }

    pub fn load_credentials(&self) -> Result<ClientCredentials> {
        load_credentials_from(&self.client_secret_file())
    }
}

fn load_credentials_from(path: &Path) -> Result<ClientCredentials> {
    let missing = |reason: String| {
        AppError::Config(format!(
            "{} ({:?}); obtain one at <{}>",
            reason, path, CREDENTIALS_HELP_URL
        ))
    };

    let contents = fs::read_to_string(path)
        .map_err(|e| missing(format!("Failed to read client secret: {}", e)))?;
    let file: ClientSecretFile = serde_json::from_str(&contents)
        .map_err(|e| missing(format!("Failed to parse client secret: {}", e)))?;

    let credentials = file
        .web
        .or(file.installed)
        .ok_or_else(|| missing("Client secret has no \"web\" section".to_string()))?;

    if credentials.client_id.is_empty() || credentials.client_secret.is_empty() {
        return Err(missing(
            "client_id and client_secret must be set in client secret".to_string(),
        ));
    }

    Ok(credentials)
}
