use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json};
use chrono::Utc;
use serde::Serialize;

use crate::auth::require_access_token;
use crate::error::RelayError;
use crate::state::ApiState;

#[derive(Serialize)]
struct Endpoint {
    url: &'static str,
    consistency: &'static str,
}

#[derive(Serialize)]
struct Bootstrap {
    version: u32,
    #[serde(rename = "databaseId")]
    database_id: uuid::Uuid,
    endpoints: Vec<Endpoint>,
    token: uuid::Uuid,
    #[serde(rename = "expiresAt")]
    expires_at: String,
}

/// `POST /` — exchanges a long-lived access token for a short-lived
/// ephemeral one. The relay only ever reports itself as a
/// single strongly-consistent endpoint; it has no notion of replicas.
pub async fn handle(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, RelayError> {
    require_access_token(&headers, &state.access_token)?;

    let token = state.ephemeral_tokens.issue(state.ephemeral_token_ttl);
    let ttl = chrono::Duration::from_std(state.ephemeral_token_ttl).unwrap_or_default();
    let expires_at = Utc::now() + ttl;

    Ok(Json(Bootstrap {
        version: 1,
        database_id: state.database_id,
        endpoints: vec![Endpoint { url: "/kv", consistency: "strong" }],
        token,
        expires_at: expires_at.to_rfc3339(),
    }))
}
