use std::path::PathBuf;

use color_eyre::Result;
use dirs::data_dir;
use tracing::debug;
#[cfg(test)]
use vanish_storage::key_provider::InMemoryKeyProvider;
use vanish_storage::{key_provider::KeyringProvider, secure_file_store::EncryptedFileStore};

use crate::config::Config;

/// Resolve the default data directory for Vanish.
pub fn default_data_dir() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| color_eyre::eyre::eyre!("no data dir available"))?;
    Ok(base.join("vanish"))
}

/// Encrypted store keyed by the OS keychain, honouring config overrides.
pub fn store_from_config(config: &Config) -> Result<EncryptedFileStore<KeyringProvider>> {
    let root = match &config.data_dir {
        Some(root) => root.clone(),
        None => default_data_dir()?,
    };
    let keyring = config.keyring();
    debug!(?root, service = %keyring.service, "initializing encrypted store");
    Ok(EncryptedFileStore::new(
        root,
        KeyringProvider::new(keyring.service, keyring.account),
    ))
}

/// Store rooted at a temp dir with an in-memory key.
#[cfg(test)]
pub fn test_store(root: impl Into<PathBuf>) -> EncryptedFileStore<InMemoryKeyProvider> {
    EncryptedFileStore::new(root, InMemoryKeyProvider::default())
}
