use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;
use tracing::debug;

const DATA_KEY_LEN: usize = 32;

/// Data key that protects secret records at rest.
#[derive(Clone, PartialEq, Eq)]
pub struct DataKey {
    /// Label for logs and rotation. Never log `bytes`.
    pub label: String,
    pub bytes: [u8; DATA_KEY_LEN],
}

impl std::fmt::Debug for DataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataKey")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("keyring error: {0}")]
    Keyring(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("generation error: {0}")]
    Generation(String),
}

/// Supplies the data key, creating it on first use.
#[async_trait]
pub trait KeyProvider: Send + Sync {
    async fn data_key(&self) -> Result<DataKey, KeyError>;
}

/// Keeps the data key in the OS keychain under `service`/`account`.
pub struct KeyringProvider {
    service: String,
    account: String,
}

impl KeyringProvider {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }
}

#[async_trait]
impl KeyProvider for KeyringProvider {
    async fn data_key(&self) -> Result<DataKey, KeyError> {
        // keyring is blocking; calls are short enough to run inline.
        let entry = keyring::Entry::new(&self.service, &self.account)
            .map_err(|e| KeyError::Keyring(e.to_string()))?;

        match entry.get_password() {
            Ok(encoded) => decode_key(&self.account, &encoded),
            Err(keyring::Error::NoEntry) => {
                debug!(service = %self.service, account = %self.account, "creating data key");
                let key = generate_key(&self.account);
                entry
                    .set_password(&STANDARD.encode(key.bytes))
                    .map_err(|e| KeyError::Keyring(e.to_string()))?;
                Ok(key)
            }
            Err(err) => Err(KeyError::Keyring(err.to_string())),
        }
    }
}

/// Process-local data key for tests and throwaway stores.
#[derive(Debug, Default, Clone)]
pub struct InMemoryKeyProvider {
    key: Arc<Mutex<Option<DataKey>>>,
}

#[async_trait]
impl KeyProvider for InMemoryKeyProvider {
    async fn data_key(&self) -> Result<DataKey, KeyError> {
        let mut slot = self
            .key
            .lock()
            .map_err(|err| KeyError::Generation(format!("lock poisoned: {err}")))?;
        Ok(slot.get_or_insert_with(|| generate_key("memory")).clone())
    }
}

fn generate_key(label: &str) -> DataKey {
    let mut bytes = [0u8; DATA_KEY_LEN];
    OsRng.fill_bytes(&mut bytes);
    DataKey {
        label: label.to_string(),
        bytes,
    }
}

fn decode_key(label: &str, encoded: &str) -> Result<DataKey, KeyError> {
    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|e| KeyError::Decode(e.to_string()))?;
    let bytes: [u8; DATA_KEY_LEN] = decoded.as_slice().try_into().map_err(|_| {
        KeyError::Decode(format!(
            "expected {DATA_KEY_LEN} bytes, got {}",
            decoded.len()
        ))
    })?;
    Ok(DataKey {
        label: label.to_string(),
        bytes,
    })
}
