//! Config entries for Gree cloud runtimes.
//!
//! TOML entries (one per cloud account), credential resolution (env +
//! keyring + plaintext), and translation to `gree_cloud_core::RuntimeConfig`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use gree_cloud_api::{CipherVersion, GreeServer};
use gree_cloud_core::{MAX_ERRORS, REQUEST_TIMEOUT, RuntimeConfig, UPDATE_INTERVAL};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const KEYRING_SERVICE: &str = "gree-cloud";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for entry '{entry}'")]
    NoCredentials { entry: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Entry used when none is named.
    pub default_entry: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named cloud accounts.
    #[serde(default)]
    pub entries: HashMap<String, EntryProfile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_entry: Some("default".into()),
            defaults: Defaults::default(),
            entries: HashMap::new(),
        }
    }
}

impl Config {
    /// Add an entry. One entry per account: a second entry for the same
    /// username is rejected.
    pub fn add_entry(&mut self, name: &str, entry: EntryProfile) -> Result<(), ConfigError> {
        if let Some((existing, _)) = self
            .entries
            .iter()
            .find(|(_, e)| e.username.eq_ignore_ascii_case(&entry.username))
        {
            return Err(ConfigError::Validation {
                field: "username".into(),
                reason: format!("account already configured as entry '{existing}'"),
            });
        }
        self.entries.insert(name.to_owned(), entry);
        Ok(())
    }

    /// Look up an entry by name, falling back to `default_entry`.
    pub fn entry(&self, name: Option<&str>) -> Result<(&str, &EntryProfile), ConfigError> {
        let name = name
            .or(self.default_entry.as_deref())
            .ok_or_else(|| ConfigError::Validation {
                field: "default_entry".into(),
                reason: "no entry named and no default set".into(),
            })?;
        self.entries
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| ConfigError::Validation {
                field: "entry".into(),
                reason: format!("no entry named '{name}'"),
            })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    /// Poll interval in seconds.
    #[serde(default = "default_update_interval")]
    pub update_interval: u64,

    #[serde(default = "default_max_errors")]
    pub max_errors: u32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            update_interval: default_update_interval(),
            max_errors: default_max_errors(),
            timeout: default_timeout(),
        }
    }
}

fn default_update_interval() -> u64 {
    UPDATE_INTERVAL.as_secs()
}
fn default_max_errors() -> u32 {
    MAX_ERRORS
}
fn default_timeout() -> u64 {
    REQUEST_TIMEOUT.as_secs()
}
fn default_cipher_version() -> u8 {
    CipherVersion::default().as_u8()
}

/// One cloud account.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EntryProfile {
    /// Region server, by display name (e.g. "Europe").
    #[serde(default)]
    pub server: GreeServer,

    pub username: String,

    /// Password (plaintext; prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Override poll interval.
    pub update_interval: Option<u64>,

    /// Override failure threshold.
    pub max_errors: Option<u32>,

    /// Override timeout.
    pub timeout: Option<u64>,

    /// Device payload cipher, 1 or 2.
    #[serde(default = "default_cipher_version")]
    pub cipher_version: u8,
}

impl EntryProfile {
    pub fn new(server: GreeServer, username: impl Into<String>) -> Self {
        Self {
            server,
            username: username.into(),
            password: None,
            password_env: None,
            update_interval: None,
            max_errors: None,
            timeout: None,
            cipher_version: default_cipher_version(),
        }
    }
}

/// Everything needed to log in to one account.
#[derive(Debug, Clone)]
pub struct EntryCredentials {
    pub server: GreeServer,
    pub username: String,
    pub password: SecretString,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "gree-cloud", "gree-cloud").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("gree-cloud");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment.
///
/// Environment variables use the `GREE_CLOUD_` prefix with `__` between
/// keys, e.g. `GREE_CLOUD_DEFAULTS__UPDATE_INTERVAL=30`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("GREE_CLOUD_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve an entry's password: env var, then system keyring, then the
/// plaintext value in the config.
pub fn resolve_password(entry: &EntryProfile, entry_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Entry's password_env → env var lookup
    if let Some(ref env_name) = entry.password_env {
        if let Ok(val) = std::env::var(env_name) {
            debug!(entry = entry_name, source = "env", "resolved password");
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(keyring_entry) = keyring::Entry::new(KEYRING_SERVICE, &format!("{entry_name}/password")) {
        if let Ok(secret) = keyring_entry.get_password() {
            debug!(entry = entry_name, source = "keyring", "resolved password");
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref pw) = entry.password {
        debug!(entry = entry_name, source = "config", "resolved password");
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        entry: entry_name.into(),
    })
}

/// Resolve login credentials for an entry.
pub fn resolve_entry(entry: &EntryProfile, entry_name: &str) -> Result<EntryCredentials, ConfigError> {
    if entry.username.trim().is_empty() {
        return Err(ConfigError::NoCredentials {
            entry: entry_name.into(),
        });
    }
    let password = resolve_password(entry, entry_name)?;
    Ok(EntryCredentials {
        server: entry.server,
        username: entry.username.clone(),
        password,
    })
}

/// Build the runtime tuning for an entry, applying global defaults.
pub fn entry_to_runtime_config(
    entry: &EntryProfile,
    defaults: &Defaults,
) -> Result<RuntimeConfig, ConfigError> {
    let cipher_version =
        CipherVersion::try_from(entry.cipher_version).map_err(|v| ConfigError::Validation {
            field: "cipher_version".into(),
            reason: format!("expected 1 or 2, got {v}"),
        })?;

    let timeout = entry.timeout.unwrap_or(defaults.timeout);
    if timeout == 0 {
        return Err(ConfigError::Validation {
            field: "timeout".into(),
            reason: "must be at least 1 second".into(),
        });
    }

    let max_errors = entry.max_errors.unwrap_or(defaults.max_errors);
    if max_errors == 0 {
        return Err(ConfigError::Validation {
            field: "max_errors".into(),
            reason: "must be at least 1".into(),
        });
    }

    Ok(RuntimeConfig {
        update_interval: Duration::from_secs(entry.update_interval.unwrap_or(defaults.update_interval)),
        max_errors,
        request_timeout: Duration::from_secs(timeout),
        cipher_version,
    })
}
