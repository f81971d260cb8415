//! Concrete crypto and storage for Vanish.
//! AES-GCM everywhere: per-secret encryption for payloads, and a data key
//! from the OS keyring (or a test double) for records at rest.

pub mod cipher;
pub mod key_provider;
pub mod secure_file_store;
