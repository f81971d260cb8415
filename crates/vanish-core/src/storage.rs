use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use thiserror::Error;

/// Errors produced by byte-level secure stores.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecureStoreError {
    /// Requested key does not exist.
    #[error("entry not found for key: {key}")]
    NotFound { key: String },
    /// Underlying storage failure.
    #[error("storage failure: {reason}")]
    Storage { reason: String },
}

/// Encrypted-at-rest key/value storage that secret repositories sit on.
#[async_trait]
pub trait SecureStore: Send + Sync {
    /// Persist a value under a key, overwriting any existing entry.
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), SecureStoreError>;

    /// Retrieve the value for a key.
    async fn get(&self, key: &str) -> Result<Vec<u8>, SecureStoreError>;

    /// Remove a key and its value (idempotent).
    async fn delete(&self, key: &str) -> Result<(), SecureStoreError>;
}

/// In-memory store for tests and dry runs. Values are XOR-masked so that
/// plaintext never sits in the map; this is not encryption.
#[derive(Debug, Default, Clone)]
pub struct InMemorySecureStore {
    entries: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl InMemorySecureStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Vec<u8>>>, SecureStoreError> {
        self.entries.lock().map_err(|err| SecureStoreError::Storage {
            reason: format!("lock poisoned: {err}"),
        })
    }
}

#[async_trait]
impl SecureStore for InMemorySecureStore {
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), SecureStoreError> {
        self.lock()?.insert(key.to_string(), mask(value));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, SecureStoreError> {
        self.lock()?
            .get(key)
            .map(|masked| mask(masked))
            .ok_or_else(|| SecureStoreError::NotFound {
                key: key.to_string(),
            })
    }

    async fn delete(&self, key: &str) -> Result<(), SecureStoreError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

const MASK_BYTE: u8 = 0x5A;

// XOR is its own inverse.
fn mask(input: &[u8]) -> Vec<u8> {
    input.iter().map(|b| b ^ MASK_BYTE).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_masked_bytes_and_reads_them_back() {
        let store = InMemorySecureStore::new();
        let record = br#"{"id":"abc","organisation":"acme"}"#;

        store.put("secrets/abc", record).await.expect("put");
        assert_eq!(store.get("secrets/abc").await.expect("get"), record);

        let raw = store.entries.lock().expect("lock");
        assert_ne!(raw.get("secrets/abc").unwrap(), &record.to_vec());
    }

    #[tokio::test]
    async fn missing_key_is_not_found_and_delete_is_idempotent() {
        let store = InMemorySecureStore::new();
        store.put("k", b"v").await.expect("put");
        store.delete("k").await.expect("delete");
        store.delete("k").await.expect("delete again");
        assert!(store.entries.lock().expect("lock").is_empty());

        let err = store.get("k").await.expect_err("gone");
        assert!(matches!(err, SecureStoreError::NotFound { .. }));
    }
}
