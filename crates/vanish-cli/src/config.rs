use std::{
    fs,
    path::{Path, PathBuf},
};

use color_eyre::Result;
use dirs::config_dir;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TTL_MINUTES: u32 = 60;
const DEFAULT_KEYRING_SERVICE: &str = "vanish-cli";
const DEFAULT_KEYRING_ACCOUNT: &str = "data-key";

/// User-level configuration loaded from `~/.config/vanish/config.toml` (platform-specific).
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Override for the encrypted store directory.
    pub data_dir: Option<PathBuf>,
    /// Lifetime used when `save` is called without `--ttl`.
    pub default_ttl_minutes: Option<u32>,
    /// Organisation used when `save` is called without `--org`.
    pub organisation: Option<String>,
    pub keyring: Option<KeyringConfig>,
}

/// Where the data key lives in the OS keychain.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct KeyringConfig {
    pub service: String,
    pub account: String,
}

impl Default for KeyringConfig {
    fn default() -> Self {
        Self {
            service: DEFAULT_KEYRING_SERVICE.to_string(),
            account: DEFAULT_KEYRING_ACCOUNT.to_string(),
        }
    }
}

impl Config {
    pub fn ttl_minutes(&self, requested: Option<u32>) -> u32 {
        requested
            .or(self.default_ttl_minutes)
            .unwrap_or(DEFAULT_TTL_MINUTES)
    }

    pub fn organisation(&self, requested: Option<String>) -> Option<String> {
        requested.or_else(|| self.organisation.clone())
    }

    pub fn keyring(&self) -> KeyringConfig {
        self.keyring.clone().unwrap_or_default()
    }
}

/// Load config from the default path; if missing, return defaults.
pub fn load() -> Result<Config> {
    load_from_path(default_path()?)
}

/// Load config from a given path; if missing or empty, return defaults.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(toml::from_str(&contents)?)
}

/// Resolve the default config path (platform aware).
pub fn default_path() -> Result<PathBuf> {
    let base = config_dir().ok_or_else(|| color_eyre::eyre::eyre!("no config dir available"))?;
    Ok(base.join("vanish").join("config.toml"))
}

/// Write `config` to the default path unless a file is already there.
pub fn write_default_if_missing(config: &Config) -> Result<PathBuf> {
    write_if_missing(config, &default_path()?)
}

fn write_if_missing(config: &Config, path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, toml::to_string_pretty(config)?)?;
    Ok(path.to_path_buf())
}
