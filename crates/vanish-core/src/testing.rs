//! Recording doubles for the save-path capabilities. They count and capture
//! every call so tests can assert on side-effect ordering. Compiled for this
//! crate's tests and behind the `testing` feature for downstream crates.

use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
};

use async_trait::async_trait;

use crate::{
    cipher::{Cipher, CipherError, EncryptedPayload},
    id::IdGenerator,
    secret::{Secret, SecretRepository},
};

/// Hands out scripted ids. Once a sequence runs dry the last id repeats.
#[derive(Debug)]
pub struct RecordingIdGenerator {
    queue: Mutex<VecDeque<String>>,
    last: Mutex<String>,
    calls: Mutex<usize>,
}

impl RecordingIdGenerator {
    pub fn repeating(id: impl Into<String>) -> Self {
        Self::sequence([id.into()])
    }

    /// Panics if `ids` is empty.
    pub fn sequence<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut queue: VecDeque<String> = ids.into_iter().map(Into::into).collect();
        let first = queue
            .pop_front()
            .expect("RecordingIdGenerator needs at least one id");
        Self {
            queue: Mutex::new(queue),
            last: Mutex::new(first),
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().expect("calls lock")
    }
}

impl IdGenerator for RecordingIdGenerator {
    fn generate(&self) -> String {
        let mut calls = self.calls.lock().expect("calls lock");
        *calls += 1;
        let mut last = self.last.lock().expect("last lock");
        // The first id is handed out as-is; later calls advance the queue.
        if *calls > 1 {
            if let Some(next) = self.queue.lock().expect("queue lock").pop_front() {
                *last = next;
            }
        }
        last.clone()
    }
}

/// Returns a fixed payload and remembers every plaintext it was given.
#[derive(Debug)]
pub struct RecordingCipher {
    output: EncryptedPayload,
    plaintexts: Mutex<Vec<String>>,
    failure: Mutex<Option<CipherError>>,
}

impl RecordingCipher {
    pub fn new(output: EncryptedPayload) -> Self {
        Self {
            output,
            plaintexts: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
        }
    }

    /// Make every subsequent `encrypt` fail with `err` (the plaintext is still recorded).
    pub fn fail_with(&self, err: CipherError) {
        *self.failure.lock().expect("failure lock") = Some(err);
    }

    pub fn plaintexts(&self) -> Vec<String> {
        self.plaintexts.lock().expect("plaintexts lock").clone()
    }
}

impl Cipher for RecordingCipher {
    fn encrypt(&self, plaintext: &str) -> Result<EncryptedPayload, CipherError> {
        self.plaintexts
            .lock()
            .expect("plaintexts lock")
            .push(plaintext.to_string());
        match self.failure.lock().expect("failure lock").clone() {
            Some(err) => Err(err),
            None => Ok(self.output.clone()),
        }
    }
}

/// Map-backed repository that records lookups and saves.
#[derive(Debug, Default)]
pub struct InMemorySecretRepository {
    secrets: Mutex<HashMap<String, Secret>>,
    lookups: Mutex<Vec<String>>,
    saved: Mutex<Vec<Secret>>,
    lookup_failure: Mutex<Option<String>>,
    save_failure: Mutex<Option<String>>,
}

impl InMemorySecretRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secrets(secrets: impl IntoIterator<Item = Secret>) -> Self {
        let repo = Self::new();
        repo.secrets
            .lock()
            .expect("secrets lock")
            .extend(secrets.into_iter().map(|s| (s.id().to_string(), s)));
        repo
    }

    /// Make every subsequent `find_by_id` fail with the given message.
    pub fn fail_lookups_with(&self, message: impl Into<String>) {
        *self.lookup_failure.lock().expect("failure lock") = Some(message.into());
    }

    /// Make every subsequent `save` fail with the given message.
    pub fn fail_saves_with(&self, message: impl Into<String>) {
        *self.save_failure.lock().expect("failure lock") = Some(message.into());
    }

    /// Ids passed to `find_by_id`, in call order.
    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().expect("lookups lock").clone()
    }

    /// Secrets passed to `save`, in call order.
    pub fn saved(&self) -> Vec<Secret> {
        self.saved.lock().expect("saved lock").clone()
    }
}

#[async_trait]
impl SecretRepository for InMemorySecretRepository {
    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<Secret>> {
        self.lookups.lock().expect("lookups lock").push(id.to_string());
        if let Some(message) = self.lookup_failure.lock().expect("failure lock").clone() {
            anyhow::bail!(message);
        }
        Ok(self.secrets.lock().expect("secrets lock").get(id).cloned())
    }

    async fn save(&self, secret: &Secret) -> anyhow::Result<()> {
        if let Some(message) = self.save_failure.lock().expect("failure lock").clone() {
            anyhow::bail!(message);
        }
        self.saved.lock().expect("saved lock").push(secret.clone());
        self.secrets
            .lock()
            .expect("secrets lock")
            .insert(secret.id().to_string(), secret.clone());
        Ok(())
    }
}
