use std::sync::Arc;
use std::time::Duration;

use kvrelay_engine::Engine;
use uuid::Uuid;

use crate::auth::EphemeralTokens;

/// Shared state handed to every handler. Cloning is cheap — everything
/// inside is already an `Arc`.
#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<dyn Engine>,
    pub database_id: Uuid,
    pub access_token: Arc<str>,
    pub ephemeral_tokens: EphemeralTokens,
    pub ephemeral_token_ttl: Duration,
}

impl ApiState {
    pub fn new(
        engine: Arc<dyn Engine>,
        database_id: Uuid,
        access_token: impl Into<Arc<str>>,
        ephemeral_token_ttl: Duration,
    ) -> Self {
        Self {
            engine,
            database_id,
            access_token: access_token.into(),
            ephemeral_tokens: EphemeralTokens::new(),
            ephemeral_token_ttl,
        }
    }
}
