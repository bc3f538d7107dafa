//! Account credentials consumed by the cache engines.
//!
//! The engines only ever read a credential's secret and active flag. This
//! module also carries registration, which validates a secret against the
//! upstream identity endpoints before storing it through the [`Cipher`].

pub mod cipher;

use tracing::info;
use uuid::Uuid;

pub use cipher::{Cipher, CipherError, PlaintextCipher};

use crate::error::CacheError;
use crate::models::{AccountCredential, NewAccountCredential};
use crate::store::CredentialStore;
use crate::upstream::UpstreamClient;

/// Default `environment` label for new accounts.
pub const DEFAULT_ENVIRONMENT: &str = "production";

/// Decrypted secret of an active credential.
pub async fn resolve_secret(
    store: &dyn CredentialStore,
    cipher: &dyn Cipher,
    credential_id: Uuid,
) -> Result<String, CacheError> {
    let credential = store
        .get_credential(credential_id)
        .await?
        .ok_or_else(|| CacheError::NotFound(format!("Account {credential_id} not found")))?;
    if !credential.is_active {
        return Err(CacheError::Unauthorized(format!(
            "Account {credential_id} is disabled"
        )));
    }
    Ok(cipher.decrypt(&credential.secret_encrypted)?)
}

/// Validate `secret` upstream and store it with the seller identity.
pub async fn register_account(
    store: &dyn CredentialStore,
    upstream: &dyn UpstreamClient,
    cipher: &dyn Cipher,
    name: &str,
    environment: Option<&str>,
    secret: &str,
) -> Result<AccountCredential, CacheError> {
    let name = name.trim();
    if name.is_empty() || name.len() > 100 {
        return Err(CacheError::Validation(
            "Account name must be 1-100 characters".into(),
        ));
    }
    let secret = secret.trim();
    if secret.is_empty() {
        return Err(CacheError::Validation("Secret must not be empty".into()));
    }

    let identity = upstream.validate_credential(secret).await?;

    let credential = store
        .insert_credential(&NewAccountCredential {
            name: name.to_string(),
            environment: environment.unwrap_or(DEFAULT_ENVIRONMENT).to_string(),
            secret_encrypted: cipher.encrypt(secret)?,
            seller_id: non_empty(identity.sid),
            seller_name: non_empty(identity.name),
            trade_mark: non_empty(identity.trade_mark),
        })
        .await?;

    info!(account_id = %credential.id, name = %credential.name, "account registered");
    Ok(credential)
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}
