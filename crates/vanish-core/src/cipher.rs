use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Output of a single encryption: everything needed to decrypt later.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedPayload {
    /// Initialization vector (nonce) used for this encryption.
    pub iv: String,
    /// Key material required to decrypt `secret`.
    pub secret_key: String,
    /// Ciphertext.
    pub secret: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CipherError {
    #[error("encrypt failed: {0}")]
    Encrypt(String),
    #[error("decrypt failed: {0}")]
    Decrypt(String),
    #[error("invalid key material: {0}")]
    Key(String),
}

/// Encryption capability used by the save path. The construction is up to
/// the implementation; callers treat the result as opaque strings.
pub trait Cipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<EncryptedPayload, CipherError>;
}
