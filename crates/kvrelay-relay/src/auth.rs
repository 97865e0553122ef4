//! Bootstrap access-token check and the ephemeral-token table that gates
//! every datapath call.

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::RelayError;

/// Live ephemeral tokens, each expiring on its own timer.
///
/// A token is inserted on issue and removed by a `tokio::spawn`ed task that
/// sleeps for the configured TTL — there is no sweep pass, just one timer
/// per token.
#[derive(Clone, Default)]
pub struct EphemeralTokens {
    live: Arc<DashMap<Uuid, ()>>,
}

impl EphemeralTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self, ttl: Duration) -> Uuid {
        let token = Uuid::new_v4();
        self.live.insert(token, ());
        let live = self.live.clone();
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            live.remove(&token);
        });
        token
    }

    pub fn is_live(&self, token: Uuid) -> bool {
        self.live.contains_key(&token)
    }
}

/// Pulls the bearer token out of `Authorization: Bearer <token>`. Any other
/// shape (missing header, wrong scheme, empty token) is an auth failure.
fn bearer_token(headers: &HeaderMap) -> Result<&str, RelayError> {
    let value = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(RelayError::Unauthorized)?;
    let token = value.strip_prefix("Bearer ").ok_or(RelayError::Unauthorized)?;
    if token.is_empty() {
        return Err(RelayError::Unauthorized);
    }
    Ok(token)
}

/// Bootstrap auth: the bearer token must equal the relay's configured
/// access token, byte for byte.
pub fn require_access_token(headers: &HeaderMap, access_token: &str) -> Result<(), RelayError> {
    let token = bearer_token(headers)?;
    if token == access_token {
        Ok(())
    } else {
        Err(RelayError::Unauthorized)
    }
}

/// Datapath auth: the bearer token must parse as a UUID and still be live
/// in the ephemeral token table.
pub fn require_ephemeral_token(
    headers: &HeaderMap,
    tokens: &EphemeralTokens,
) -> Result<(), RelayError> {
    let token = bearer_token(headers)?;
    let token = Uuid::parse_str(token).map_err(|_| RelayError::Unauthorized)?;
    if tokens.is_live(token) {
        Ok(())
    } else {
        Err(RelayError::Unauthorized)
    }
}
