//! Opaque bearer tokens.
//!
//! A token is `rxd_` followed by 32 lowercase hex characters. It is shown to
//! its owner exactly once; the store keeps only its SHA-256 hex digest.

use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

use crate::{Actor, ServiceError, Store};

pub const TOKEN_PREFIX: &str = "rxd_";

pub fn generate_token() -> String {
    format!("{TOKEN_PREFIX}{}", Uuid::new_v4().simple())
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn well_formed(token: &str) -> bool {
    token
        .strip_prefix(TOKEN_PREFIX)
        .is_some_and(|rest| rest.len() == 32 && rest.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// Resolve a bearer token to its user.
///
/// Malformed or unknown tokens are `Unauthorized`; a deactivated account is
/// `Forbidden`.
pub async fn authenticate(store: &dyn Store, token: &str) -> Result<Actor, ServiceError> {
    let token = token.trim();
    if !well_formed(token) {
        return Err(ServiceError::Unauthorized);
    }
    let Some(user) = store.fetch_user_by_token_hash(&hash_token(token)).await? else {
        debug!("bearer token did not match any user");
        return Err(ServiceError::Unauthorized);
    };
    if !user.active {
        return Err(ServiceError::forbidden("account is deactivated"));
    }
    Ok(Actor::from_user(&user))
}
