use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while constructing a `Secret`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SecretError {
    /// Every secret must be scoped to an organisation.
    #[error("Organization must be provided")]
    MissingOrganisation,
}

/// Raw attributes handed to `Secret::new`. Nothing here is recomputed; the
/// caller is trusted for everything except the organisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretFields {
    pub id: String,
    pub secret: String,
    pub token: String,
    pub iv: String,
    pub expire_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub organisation: Option<String>,
}

/// One stored secret: ciphertext plus the metadata needed to retrieve and
/// expire it. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "StoredSecret", rename_all = "camelCase")]
pub struct Secret {
    id: String,
    secret: String,
    token: String,
    iv: String,
    expire_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    organisation: String,
}

impl Secret {
    pub fn new(fields: SecretFields) -> Result<Self, SecretError> {
        let organisation = validate_organisation(fields.organisation.as_deref())?;
        Ok(Self {
            id: fields.id,
            secret: fields.secret,
            token: fields.token,
            iv: fields.iv,
            expire_at: fields.expire_at,
            created_at: fields.created_at,
            updated_at: fields.updated_at,
            organisation,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Ciphertext produced by the cipher.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Decryption-access token handed back to whoever saved the secret.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn iv(&self) -> &str {
        &self.iv
    }

    pub fn expire_at(&self) -> DateTime<Utc> {
        self.expire_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn organisation(&self) -> &str {
        &self.organisation
    }

    /// A secret is expired from its `expire_at` instant onwards.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expire_at
    }
}

/// Returns the non-blank organisation, as given, or the validation error.
pub fn validate_organisation(organisation: Option<&str>) -> Result<String, SecretError> {
    match organisation {
        Some(org) if !org.trim().is_empty() => Ok(org.to_string()),
        _ => Err(SecretError::MissingOrganisation),
    }
}

// Wire shape for deserialization so stored records go through `Secret::new`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSecret {
    id: String,
    secret: String,
    token: String,
    iv: String,
    expire_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    organisation: Option<String>,
}

impl TryFrom<StoredSecret> for Secret {
    type Error = SecretError;

    fn try_from(stored: StoredSecret) -> Result<Self, Self::Error> {
        Secret::new(SecretFields {
            id: stored.id,
            secret: stored.secret,
            token: stored.token,
            iv: stored.iv,
            expire_at: stored.expire_at,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
            organisation: stored.organisation,
        })
    }
}

/// Persistence contract for secrets.
#[async_trait]
pub trait SecretRepository: Send + Sync {
    /// Look up a secret by id; `None` when absent.
    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<Secret>>;

    /// Persist a fully-formed secret.
    async fn save(&self, secret: &Secret) -> anyhow::Result<()>;
}
