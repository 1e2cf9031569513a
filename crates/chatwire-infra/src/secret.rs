//! Bearer token resolution.
//!
//! The `CHATWIRE_TOKEN` environment variable wins; otherwise the token saved
//! by `chatwire login` under the `token` key of the local store is used.
//! Tokens are only ever handled as [`SecretString`].

use secrecy::{ExposeSecret, SecretString};

use chatwire_core::persistence::KvBackend;
use chatwire_types::error::PersistenceError;

/// Environment variable carrying the bearer token.
pub const TOKEN_ENV: &str = "CHATWIRE_TOKEN";

/// Store key of the saved bearer token.
pub const TOKEN_KEY: &str = "token";

/// Resolve the bearer token from the environment, then the store.
pub fn resolve_token<B: KvBackend>(store: &B) -> Option<SecretString> {
    resolve_token_from(std::env::var(TOKEN_ENV).ok(), store)
}

/// Resolution with the environment value passed in.
pub fn resolve_token_from<B: KvBackend>(
    env_value: Option<String>,
    store: &B,
) -> Option<SecretString> {
    if let Some(value) = env_value.filter(|v| !v.trim().is_empty()) {
        tracing::debug!("using bearer token from {TOKEN_ENV}");
        return Some(SecretString::from(value.trim().to_string()));
    }

    match store.get(TOKEN_KEY) {
        Ok(Some(value)) if !value.trim().is_empty() => {
            Some(SecretString::from(value.trim().to_string()))
        }
        Ok(_) => None,
        Err(err) => {
            tracing::warn!(error = %err, "failed to read saved token");
            None
        }
    }
}

/// Save a token for later sessions.
pub fn store_token<B: KvBackend>(store: &B, token: &SecretString) -> Result<(), PersistenceError> {
    store.set(TOKEN_KEY, token.expose_secret().trim())
}

/// Forget the saved token.
pub fn clear_token<B: KvBackend>(store: &B) -> Result<(), PersistenceError> {
    store.delete(TOKEN_KEY)
}
