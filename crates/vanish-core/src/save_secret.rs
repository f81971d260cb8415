use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::{
    cipher::{Cipher, CipherError},
    clock::{Clock, SystemClock},
    id::IdGenerator,
    secret::{validate_organisation, Secret, SecretError, SecretFields, SecretRepository},
};

const MILLIS_PER_MINUTE: i64 = 60_000;

/// Input to the save path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SaveSecretRequest {
    /// Plaintext to protect.
    pub payload: String,
    /// Requested lifetime in minutes.
    #[serde(alias = "expireAt")]
    pub ttl_minutes: u32,
    pub organisation: Option<String>,
}

#[derive(Debug, Error)]
pub enum SaveSecretError {
    #[error(transparent)]
    Validation(#[from] SecretError),
    #[error("Secret id already exists")]
    Conflict { id: String },
    #[error("expiry of {ttl_minutes} minutes is out of range")]
    ExpiryOutOfRange { ttl_minutes: u32 },
    #[error(transparent)]
    Cipher(#[from] CipherError),
    #[error(transparent)]
    Repository(#[from] anyhow::Error),
}

/// Turns a save request into an encrypted, persisted `Secret`.
///
/// Side effects happen in a fixed order, each at most once: id generation,
/// existence check, encryption, persistence. Validation and collision
/// failures stop before anything later in that chain runs.
#[derive(Clone)]
pub struct SaveSecret {
    id_generator: Arc<dyn IdGenerator>,
    cipher: Arc<dyn Cipher>,
    repository: Arc<dyn SecretRepository>,
    clock: Arc<dyn Clock>,
}

impl SaveSecret {
    pub fn new(
        id_generator: Arc<dyn IdGenerator>,
        cipher: Arc<dyn Cipher>,
        repository: Arc<dyn SecretRepository>,
    ) -> Self {
        Self {
            id_generator,
            cipher,
            repository,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[instrument(skip_all, fields(organisation = request.organisation.as_deref(), ttl_minutes = request.ttl_minutes))]
    pub async fn execute(&self, request: SaveSecretRequest) -> Result<Secret, SaveSecretError> {
        let organisation = validate_organisation(request.organisation.as_deref())?;

        let id = self.id_generator.generate();
        if self.repository.find_by_id(&id).await?.is_some() {
            debug!(%id, "generated id collides with a stored secret");
            return Err(SaveSecretError::Conflict { id });
        }

        let encrypted = self.cipher.encrypt(&request.payload)?;

        let created_at = self.clock.now();
        let expire_at = expiry_for(created_at, request.ttl_minutes).ok_or(
            SaveSecretError::ExpiryOutOfRange {
                ttl_minutes: request.ttl_minutes,
            },
        )?;

        let secret = Secret::new(SecretFields {
            id,
            secret: encrypted.secret,
            token: encrypted.secret_key,
            iv: encrypted.iv,
            expire_at,
            created_at,
            updated_at: created_at,
            organisation: Some(organisation),
        })?;

        self.repository.save(&secret).await?;
        debug!(id = secret.id(), expire_at = %secret.expire_at(), "secret saved");
        Ok(secret)
    }
}

/// `created_at + ttl_minutes * 60000 ms`, or `None` if unrepresentable.
pub fn expiry_for(created_at: DateTime<Utc>, ttl_minutes: u32) -> Option<DateTime<Utc>> {
    let millis = i64::from(ttl_minutes).checked_mul(MILLIS_PER_MINUTE)?;
    created_at.checked_add_signed(Duration::try_milliseconds(millis)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cipher::EncryptedPayload,
        clock::FixedClock,
        testing::{InMemorySecretRepository, RecordingCipher, RecordingIdGenerator},
    };

    struct Harness {
        ids: Arc<RecordingIdGenerator>,
        cipher: Arc<RecordingCipher>,
        repo: Arc<InMemorySecretRepository>,
        now: DateTime<Utc>,
        use_case: SaveSecret,
    }

    fn mock_instant() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2022-06-30T20:28:10.001Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn harness(ids: RecordingIdGenerator, repo: InMemorySecretRepository) -> Harness {
        harness_at(ids, repo, mock_instant())
    }

    fn harness_at(
        ids: RecordingIdGenerator,
        repo: InMemorySecretRepository,
        now: DateTime<Utc>,
    ) -> Harness {
        let ids = Arc::new(ids);
        let cipher = Arc::new(RecordingCipher::new(EncryptedPayload {
            iv: "444".into(),
            secret_key: "asdbujiasdfbuiag".into(),
            secret: "ioqwerbioergnioeniooninioerg".into(),
        }));
        let repo = Arc::new(repo);
        let use_case = SaveSecret::new(ids.clone(), cipher.clone(), repo.clone())
            .with_clock(Arc::new(FixedClock(now)));
        Harness {
            ids,
            cipher,
            repo,
            now,
            use_case,
        }
    }

    fn request(organisation: Option<&str>) -> SaveSecretRequest {
        SaveSecretRequest {
            payload: "SuperSECRET".into(),
            ttl_minutes: 6000,
            organisation: organisation.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn saves_an_encrypted_secret() {
        let h = harness(
            RecordingIdGenerator::repeating("111133333"),
            InMemorySecretRepository::new(),
        );

        let saved = h
            .use_case
            .execute(request(Some("*")))
            .await
            .expect("save should succeed");

        let expected = Secret::new(SecretFields {
            id: "111133333".into(),
            secret: "ioqwerbioergnioeniooninioerg".into(),
            token: "asdbujiasdfbuiag".into(),
            iv: "444".into(),
            expire_at: h.now + Duration::milliseconds(6000 * 60_000),
            created_at: h.now,
            updated_at: h.now,
            organisation: Some("*".into()),
        })
        .unwrap();

        assert_eq!(saved, expected);
        assert_eq!(h.repo.saved(), vec![expected]);
        assert_eq!(h.cipher.plaintexts(), vec!["SuperSECRET".to_string()]);
        assert_eq!(h.repo.lookups(), vec!["111133333".to_string()]);
        assert_eq!(h.ids.calls(), 1);
    }

    #[tokio::test]
    async fn missing_organisation_short_circuits() {
        for org in [None, Some("")] {
            let h = harness(
                RecordingIdGenerator::repeating("111133333"),
                InMemorySecretRepository::new(),
            );

            let err = h
                .use_case
                .execute(request(org))
                .await
                .expect_err("organisation is mandatory");

            assert!(matches!(
                err,
                SaveSecretError::Validation(SecretError::MissingOrganisation)
            ));
            assert_eq!(err.to_string(), "Organization must be provided");
            assert_eq!(h.ids.calls(), 0);
            assert!(h.repo.lookups().is_empty());
            assert!(h.cipher.plaintexts().is_empty());
            assert!(h.repo.saved().is_empty());
        }
    }

    #[tokio::test]
    async fn colliding_id_is_rejected_before_encryption() {
        let h = harness(
            RecordingIdGenerator::repeating("111133333"),
            InMemorySecretRepository::new(),
        );
        h.use_case
            .execute(request(Some("*")))
            .await
            .expect("first save");

        let err = h
            .use_case
            .execute(request(Some("*")))
            .await
            .expect_err("second save collides");

        assert!(matches!(&err, SaveSecretError::Conflict { id } if id == "111133333"));
        assert_eq!(err.to_string(), "Secret id already exists");
        assert_eq!(h.ids.calls(), 2);
        assert_eq!(h.repo.lookups().len(), 2);
        assert_eq!(h.cipher.plaintexts().len(), 1);
        assert_eq!(h.repo.saved().len(), 1);
    }

    #[tokio::test]
    async fn preexisting_record_blocks_save() {
        let existing = Secret::new(SecretFields {
            id: "111133333".into(),
            secret: "x".into(),
            token: "y".into(),
            iv: "z".into(),
            expire_at: mock_instant(),
            created_at: mock_instant(),
            updated_at: mock_instant(),
            organisation: Some("other".into()),
        })
        .unwrap();
        let h = harness(
            RecordingIdGenerator::repeating("111133333"),
            InMemorySecretRepository::with_secrets([existing]),
        );

        let err = h
            .use_case
            .execute(request(Some("*")))
            .await
            .expect_err("collision");

        assert!(matches!(err, SaveSecretError::Conflict { .. }));
        assert_eq!(h.repo.lookups(), vec!["111133333".to_string()]);
        assert!(h.cipher.plaintexts().is_empty());
        assert!(h.repo.saved().is_empty());
        assert_eq!(h.ids.calls(), 1);
    }

    #[tokio::test]
    async fn distinct_ids_produce_distinct_saves() {
        let h = harness(
            RecordingIdGenerator::sequence(["a1", "b2"]),
            InMemorySecretRepository::new(),
        );

        let first = h.use_case.execute(request(Some("acme"))).await.unwrap();
        let second = h.use_case.execute(request(Some("acme"))).await.unwrap();

        assert_ne!(first.id(), second.id());
        assert_eq!(h.repo.saved().len(), 2);
    }

    #[tokio::test]
    async fn repository_failures_propagate_unchanged() {
        let repo = InMemorySecretRepository::new();
        repo.fail_saves_with("disk full");
        let h = harness(RecordingIdGenerator::repeating("id-1"), repo);

        let err = h
            .use_case
            .execute(request(Some("acme")))
            .await
            .expect_err("save fails");

        assert!(matches!(err, SaveSecretError::Repository(_)));
        assert_eq!(err.to_string(), "disk full");
        assert_eq!(h.cipher.plaintexts().len(), 1);
    }

    #[tokio::test]
    async fn cipher_failure_propagates_without_saving() {
        let h = harness(
            RecordingIdGenerator::repeating("id-1"),
            InMemorySecretRepository::new(),
        );
        h.cipher.fail_with(CipherError::Encrypt("boom".into()));

        let err = h
            .use_case
            .execute(request(Some("acme")))
            .await
            .expect_err("encrypt fails");

        assert!(matches!(
            &err,
            SaveSecretError::Cipher(CipherError::Encrypt(msg)) if msg == "boom"
        ));
        assert_eq!(err.to_string(), "encrypt failed: boom");
        assert_eq!(h.cipher.plaintexts(), vec!["SuperSECRET".to_string()]);
        assert!(h.repo.saved().is_empty());
    }

    #[tokio::test]
    async fn unrepresentable_expiry_fails_before_saving() {
        let h = harness_at(
            RecordingIdGenerator::repeating("id-1"),
            InMemorySecretRepository::new(),
            DateTime::<Utc>::MAX_UTC,
        );
        let req = SaveSecretRequest {
            ttl_minutes: 1,
            ..request(Some("acme"))
        };

        let err = h.use_case.execute(req).await.expect_err("out of range");

        assert!(matches!(
            err,
            SaveSecretError::ExpiryOutOfRange { ttl_minutes: 1 }
        ));
        assert_eq!(err.to_string(), "expiry of 1 minutes is out of range");
        assert!(h.repo.saved().is_empty());
    }

    #[tokio::test]
    async fn lookup_failure_propagates_before_encryption() {
        let repo = InMemorySecretRepository::new();
        repo.fail_lookups_with("connection reset");
        let h = harness(RecordingIdGenerator::repeating("id-1"), repo);

        let err = h
            .use_case
            .execute(request(Some("acme")))
            .await
            .expect_err("lookup fails");

        assert!(matches!(err, SaveSecretError::Repository(_)));
        assert_eq!(err.to_string(), "connection reset");
        assert_eq!(h.repo.lookups(), vec!["id-1".to_string()]);
        assert!(h.cipher.plaintexts().is_empty());
        assert!(h.repo.saved().is_empty());
    }

    #[test]
    fn expiry_is_exact_minute_arithmetic() {
        let created = mock_instant();
        for minutes in [0u32, 1, 59, 6000, 525_600, u32::MAX] {
            let expire = expiry_for(created, minutes).expect("in range");
            assert_eq!(
                (expire - created).num_milliseconds(),
                i64::from(minutes) * 60_000
            );
        }
    }

    #[test]
    fn request_accepts_expire_at_alias() {
        let req: SaveSecretRequest = serde_json::from_str(
            r#"{"payload":"SuperSECRET","expireAt":6000,"organisation":"*"}"#,
        )
        .expect("parse");
        assert_eq!(req, request(Some("*")));
    }
}
