//! Configuration management
//!
//! Settings live in `settings.json` inside the data directory:
//! ```json
//! {
//!   "auth": {
//!     "tokenTtlSeconds": 3600,
//!     "tokenSecret": "<hex>",
//!     "argon2": { "memoryCost": 65536, "timeCost": 3, "parallelism": 4 }
//!   },
//!   "storage": { "databaseFile": "tally.duckdb" }
//! }
//! ```
//! Keys this crate does not manage are preserved on save.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Tokens expire one hour after issuance unless configured otherwise
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

pub const DEFAULT_DATABASE_FILE: &str = "tally.duckdb";

/// Default Argon2id parameters
pub const DEFAULT_TIME_COST: u32 = 3;
pub const DEFAULT_MEMORY_COST: u32 = 65536; // 64 MiB
pub const DEFAULT_PARALLELISM: u32 = 4;

/// Argon2id cost parameters for password hashing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Argon2Params {
    /// Memory in KiB
    pub memory_cost: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            memory_cost: DEFAULT_MEMORY_COST,
            time_cost: DEFAULT_TIME_COST,
            parallelism: DEFAULT_PARALLELISM,
        }
    }
}

impl Argon2Params {
    /// Lowest cost argon2 accepts. Only for tests.
    pub fn minimal() -> Self {
        Self {
            memory_cost: 8,
            time_cost: 1,
            parallelism: 1,
        }
    }
}

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    auth: AuthSettings,
    #[serde(default)]
    storage: StorageSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_ttl_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    argon2: Option<Argon2Params>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StorageSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    database_file: Option<String>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Tally configuration (resolved view of settings + environment)
#[derive(Debug, Clone)]
pub struct Config {
    pub token_ttl: Duration,
    /// HMAC secret for bearer tokens
    pub token_secret: Option<Vec<u8>>,
    pub argon2: Argon2Params,
    pub database_file: String,
    /// Secret came from TALLY_TOKEN_SECRET and must not be written to disk
    secret_from_env: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token_ttl: Duration::from_secs(DEFAULT_TOKEN_TTL_SECS),
            token_secret: None,
            argon2: Argon2Params::default(),
            database_file: DEFAULT_DATABASE_FILE.to_string(),
            secret_from_env: false,
        }
    }
}

impl Config {
    /// Load config from the data directory
    ///
    /// Overrides read from the environment:
    /// - TALLY_TOKEN_SECRET: hex-encoded token secret
    /// - TALLY_TOKEN_TTL_SECONDS: token lifetime
    pub fn load(data_dir: &Path) -> Result<Self> {
        let raw = read_settings(data_dir)?;

        let mut token_secret = raw
            .auth
            .token_secret
            .as_deref()
            .map(|s| hex::decode(s.trim()))
            .transpose()
            .context("tokenSecret in settings.json is not valid hex")?;

        let mut secret_from_env = false;
        if let Ok(secret) = std::env::var("TALLY_TOKEN_SECRET") {
            token_secret =
                Some(hex::decode(secret.trim()).context("TALLY_TOKEN_SECRET is not valid hex")?);
            secret_from_env = true;
        }

        let ttl_secs = match std::env::var("TALLY_TOKEN_TTL_SECONDS").ok() {
            Some(v) => v
                .trim()
                .parse::<u64>()
                .context("TALLY_TOKEN_TTL_SECONDS must be a whole number of seconds")?,
            None => raw.auth.token_ttl_seconds.unwrap_or(DEFAULT_TOKEN_TTL_SECS),
        };

        Ok(Self {
            token_ttl: Duration::from_secs(ttl_secs),
            token_secret,
            argon2: raw.auth.argon2.clone().unwrap_or_default(),
            database_file: raw
                .storage
                .database_file
                .clone()
                .unwrap_or_else(|| DEFAULT_DATABASE_FILE.to_string()),
            secret_from_env,
        })
    }

    /// Save config to the data directory
    /// Preserves other settings that this crate doesn't manage
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let mut settings = read_settings(data_dir)?;

        settings.auth.token_ttl_seconds = Some(self.token_ttl.as_secs());
        settings.auth.argon2 = Some(self.argon2.clone());
        settings.storage.database_file = Some(self.database_file.clone());
        if !self.secret_from_env {
            settings.auth.token_secret = self.token_secret.as_ref().map(hex::encode);
        }

        let content = serde_json::to_string_pretty(&settings)?;
        write_private(&data_dir.join("settings.json"), content.as_bytes())
    }

    /// Generate a random 32-byte token secret if none is configured
    ///
    /// Returns true when a new secret was generated and the config should
    /// be saved.
    pub fn ensure_token_secret(&mut self) -> bool {
        if self.token_secret.is_some() {
            return false;
        }
        let secret: [u8; 32] = rand::thread_rng().gen();
        self.token_secret = Some(secret.to_vec());
        true
    }
}

/// Write a file readable by the owner only; it may hold the token secret
fn write_private(path: &Path, content: &[u8]) -> Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    // mode() only applies on creation; tighten files written by older versions
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }

    file.write_all(content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn read_settings(data_dir: &Path) -> Result<SettingsFile> {
    let settings_path = data_dir.join("settings.json");
    if !settings_path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(&settings_path)
        .with_context(|| format!("Failed to read {}", settings_path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", settings_path.display()))
}
