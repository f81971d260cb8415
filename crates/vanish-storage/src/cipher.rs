use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use vanish_core::cipher::{Cipher, CipherError, EncryptedPayload};

const NONCE_LEN: usize = 12;

/// AES-256-GCM with a fresh random key and nonce per secret.
/// All three outputs are URL-safe base64 without padding.
#[derive(Debug, Default, Clone, Copy)]
pub struct AesGcmCipher;

impl AesGcmCipher {
    pub fn new() -> Self {
        Self
    }

    /// Reverse of `encrypt`, given the payload it produced.
    pub fn decrypt(&self, payload: &EncryptedPayload) -> Result<String, CipherError> {
        let key = decode(&payload.secret_key, "secret key")?;
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| CipherError::Key(format!("cipher init failed: {e}")))?;

        let iv = decode(&payload.iv, "iv")?;
        if iv.len() != NONCE_LEN {
            return Err(CipherError::Decrypt(format!(
                "expected {NONCE_LEN}-byte iv, got {}",
                iv.len()
            )));
        }

        let ciphertext = decode(&payload.secret, "ciphertext")?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&iv), ciphertext.as_ref())
            .map_err(|e| CipherError::Decrypt(e.to_string()))?;
        String::from_utf8(plaintext).map_err(|e| CipherError::Decrypt(e.to_string()))
    }
}

impl Cipher for AesGcmCipher {
    fn encrypt(&self, plaintext: &str) -> Result<EncryptedPayload, CipherError> {
        let key = Aes256Gcm::generate_key(&mut OsRng);
        let cipher = Aes256Gcm::new(&key);
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| CipherError::Encrypt(e.to_string()))?;

        Ok(EncryptedPayload {
            iv: URL_SAFE_NO_PAD.encode(nonce.as_slice()),
            secret_key: URL_SAFE_NO_PAD.encode(key.as_slice()),
            secret: URL_SAFE_NO_PAD.encode(ciphertext),
        })
    }
}

fn decode(value: &str, what: &str) -> Result<Vec<u8>, CipherError> {
    URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| CipherError::Decrypt(format!("{what} decode failed: {e}")))
}
