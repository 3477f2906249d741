use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Connection details for the remote document store and file bucket.
///
/// The API key itself never lives in the config file; only the name of the
/// environment variable that holds it.
#[derive(Debug, Deserialize, Clone)]
pub struct RemoteConfig {
    /// Base URL of the backend, e.g. `https://backend.example.com/v1`.
    pub endpoint: String,
    /// Project identifier sent with every request.
    pub project: String,
    /// Database containing the assessments collection.
    pub database_id: String,
    /// Collection that holds synced assessment documents.
    pub collection_id: String,
    /// Storage bucket for uploaded images.
    pub bucket_id: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_api_key_env() -> String {
    "FIELDVAL_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    /// Identity stamped onto synced documents. May be overridden with
    /// `fieldval sync --user`.
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            user_id: None,
            timeout_secs: 30,
            max_retries: 5,
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    5
}

impl Config {
    /// Minimal config for commands that only need local state.
    pub fn minimal(db_path: PathBuf) -> Self {
        Self {
            db: DbConfig { path: db_path },
            remote: None,
            sync: SyncConfig::default(),
        }
    }

    /// The remote section, or an error telling the user how to fix it.
    pub fn remote(&self) -> Result<&RemoteConfig> {
        self.remote
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("No [remote] section in config; sync requires one"))
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.sync.timeout_secs == 0 {
        anyhow::bail!("sync.timeout_secs must be > 0");
    }

    if let Some(remote) = &config.remote {
        if remote.endpoint.is_empty() {
            anyhow::bail!("remote.endpoint must not be empty");
        }
        if remote.endpoint.ends_with('/') {
            anyhow::bail!("remote.endpoint must not end with '/'");
        }
        for (field, value) in [
            ("remote.project", &remote.project),
            ("remote.database_id", &remote.database_id),
            ("remote.collection_id", &remote.collection_id),
            ("remote.bucket_id", &remote.bucket_id),
        ] {
            if value.is_empty() {
                anyhow::bail!("{} must not be empty", field);
            }
        }
    }

    Ok(config)
}
