use std::sync::Arc;

use chrono::SecondsFormat;
use color_eyre::Result;
use vanish_core::{
    id::UuidIdGenerator,
    save_secret::{SaveSecret, SaveSecretRequest},
    secret::Secret,
    storage::SecureStore,
};
use vanish_secret::SecureStoreSecretRepo;
use vanish_storage::cipher::AesGcmCipher;

use crate::{config::Config, storage};

/// Execute `vanish save` against the configured encrypted store.
pub async fn handle(
    payload: Vec<String>,
    ttl: Option<u32>,
    organisation: Option<String>,
    config: &Config,
) -> Result<()> {
    let use_case = build_use_case(storage::store_from_config(config)?);
    let request = SaveSecretRequest {
        payload: payload.join(" "),
        ttl_minutes: config.ttl_minutes(ttl),
        organisation: config.organisation(organisation),
    };
    let secret = save(&use_case, request).await?;
    println!("{}", render(&secret));
    Ok(())
}

/// Wire the production collaborators around `store`.
pub fn build_use_case<S: SecureStore + 'static>(store: S) -> SaveSecret {
    SaveSecret::new(
        Arc::new(UuidIdGenerator),
        Arc::new(AesGcmCipher::new()),
        Arc::new(SecureStoreSecretRepo::new(store)),
    )
}

async fn save(use_case: &SaveSecret, request: SaveSecretRequest) -> Result<Secret> {
    use_case
        .execute(request)
        .await
        .map_err(|e| color_eyre::eyre::eyre!(e.to_string()))
}

fn render(secret: &Secret) -> String {
    format!(
        "Saved secret {}\n    organisation: {}\n    token: {}\n    expires: {}",
        secret.id(),
        secret.organisation(),
        secret.token(),
        secret.expire_at().to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}
