use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    Aes256Gcm, Nonce,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::instrument;
use vanish_core::storage::{SecureStore, SecureStoreError};

use crate::key_provider::{DataKey, KeyProvider};

const BLOB_VERSION: u8 = 1;
const BLOB_EXTENSION: &str = "sealed";

/// File-per-key store sealing each value with AES-256-GCM under the
/// provider's data key. The storage key is bound as associated data, so a
/// blob copied onto another key's path fails to open.
pub struct EncryptedFileStore<P: KeyProvider> {
    root: PathBuf,
    key_provider: P,
}

impl<P: KeyProvider> EncryptedFileStore<P> {
    pub fn new(root: impl Into<PathBuf>, key_provider: P) -> Self {
        Self {
            root: root.into(),
            key_provider,
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}.{BLOB_EXTENSION}", URL_SAFE_NO_PAD.encode(key)))
    }

    async fn cipher(&self) -> Result<Aes256Gcm, SecureStoreError> {
        let key = self
            .key_provider
            .data_key()
            .await
            .map_err(|e| storage_err(format!("key provider: {e}")))?;
        build_cipher(&key)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SealedBlob {
    version: u8,
    nonce: String,
    ciphertext: String,
}

#[async_trait]
impl<P: KeyProvider> SecureStore for EncryptedFileStore<P> {
    #[instrument(skip_all, fields(key = %key))]
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), SecureStoreError> {
        let cipher = self.cipher().await?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: value,
                    aad: key.as_bytes(),
                },
            )
            .map_err(|e| storage_err(format!("seal failed: {e}")))?;

        let blob = SealedBlob {
            version: BLOB_VERSION,
            nonce: URL_SAFE_NO_PAD.encode(nonce.as_slice()),
            ciphertext: URL_SAFE_NO_PAD.encode(ciphertext),
        };
        write_atomically(&self.path_for(key), &blob)
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn get(&self, key: &str) -> Result<Vec<u8>, SecureStoreError> {
        let blob = read_blob(key, &self.path_for(key))?;
        if blob.version != BLOB_VERSION {
            return Err(storage_err(format!(
                "unsupported blob version {}",
                blob.version
            )));
        }

        let nonce = URL_SAFE_NO_PAD
            .decode(&blob.nonce)
            .map_err(|e| storage_err(format!("nonce decode failed: {e}")))?;
        if nonce.len() != 12 {
            return Err(storage_err(format!("bad nonce length {}", nonce.len())));
        }
        let ciphertext = URL_SAFE_NO_PAD
            .decode(&blob.ciphertext)
            .map_err(|e| storage_err(format!("ciphertext decode failed: {e}")))?;

        self.cipher()
            .await?
            .decrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: &ciphertext,
                    aad: key.as_bytes(),
                },
            )
            .map_err(|e| storage_err(format!("open failed: {e}")))
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn delete(&self, key: &str) -> Result<(), SecureStoreError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(storage_err(err)),
        }
    }
}

fn write_atomically(path: &Path, blob: &SealedBlob) -> Result<(), SecureStoreError> {
    let dir = path
        .parent()
        .ok_or_else(|| storage_err("invalid storage path"))?;
    fs::create_dir_all(dir).map_err(storage_err)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(storage_err)?;
    serde_json::to_writer(&mut tmp, blob).map_err(storage_err)?;
    tmp.flush().map_err(storage_err)?;
    tmp.persist(path).map_err(|e| storage_err(e.error))?;
    Ok(())
}

fn read_blob(key: &str, path: &Path) -> Result<SealedBlob, SecureStoreError> {
    let bytes = fs::read(path).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            SecureStoreError::NotFound {
                key: key.to_string(),
            }
        } else {
            storage_err(err)
        }
    })?;
    serde_json::from_slice(&bytes).map_err(storage_err)
}

fn build_cipher(key: &DataKey) -> Result<Aes256Gcm, SecureStoreError> {
    Aes256Gcm::new_from_slice(&key.bytes)
        .map_err(|e| storage_err(format!("cipher init failed: {e}")))
}

fn storage_err<E: ToString>(err: E) -> SecureStoreError {
    SecureStoreError::Storage {
        reason: err.to_string(),
    }
}
