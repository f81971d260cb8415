use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::instrument;
use vanish_core::{
    secret::{Secret, SecretRepository},
    storage::{SecureStore, SecureStoreError},
};

const KEY_PREFIX: &str = "secrets/";

/// Secret repository backed by a `SecureStore`: one JSON record per id.
pub struct SecureStoreSecretRepo<S: SecureStore> {
    store: Arc<S>,
}

impl<S: SecureStore> SecureStoreSecretRepo<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    fn key_for(id: &str) -> String {
        format!("{KEY_PREFIX}{id}")
    }
}

#[async_trait]
impl<S: SecureStore> SecretRepository for SecureStoreSecretRepo<S> {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: &str) -> Result<Option<Secret>> {
        match self.store.get(&Self::key_for(id)).await {
            Ok(bytes) => {
                let secret = serde_json::from_slice(&bytes)
                    .with_context(|| format!("corrupt secret record {id}"))?;
                Ok(Some(secret))
            }
            Err(SecureStoreError::NotFound { .. }) => Ok(None),
            Err(err) => Err(anyhow::anyhow!(err)),
        }
    }

    #[instrument(skip_all, fields(id = secret.id()))]
    async fn save(&self, secret: &Secret) -> Result<()> {
        let bytes = serde_json::to_vec(secret)?;
        self.store
            .put(&Self::key_for(secret.id()), &bytes)
            .await
            .map_err(|e| anyhow::anyhow!(e))
    }
}
