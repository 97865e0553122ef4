//! Shared HTTP helpers — bootstrap against `/` to trade the operator's
//! access token for an ephemeral one, then call it against a datapath
//! endpoint with the wire-format byte payloads the datapath endpoints
//! actually speak.

use anyhow::{Context, Result};
use serde::Deserialize;

pub fn base_url(host: &str, port: u16) -> String {
    format!("http://{host}:{port}")
}

#[derive(Deserialize)]
pub struct Bootstrap {
    #[allow(dead_code)]
    pub version: u32,
    #[serde(rename = "databaseId")]
    pub database_id: String,
    pub endpoints: Vec<BootstrapEndpoint>,
    pub token: String,
    #[serde(rename = "expiresAt")]
    pub expires_at: String,
}

#[derive(Deserialize)]
pub struct BootstrapEndpoint {
    pub url: String,
    pub consistency: String,
}

/// `POST /` with the operator's access token, returning the issued ephemeral
/// token via the bootstrap bearer exchange.
pub async fn bootstrap(base: &str, access_token: &str) -> Result<Bootstrap> {
    reqwest::Client::new()
        .post(base)
        .bearer_auth(access_token)
        .send()
        .await
        .with_context(|| format!("failed to connect to kvrelayd at {base} — is it running?"))?
        .error_for_status()
        .context("bootstrap request rejected")?
        .json::<Bootstrap>()
        .await
        .context("failed to parse bootstrap response")
}

/// POSTs a wire-format request body to a datapath endpoint, returning the
/// raw wire-format response body.
pub async fn post_wire(base: &str, path: &str, ephemeral_token: &str, body: Vec<u8>) -> Result<Vec<u8>> {
    let response = reqwest::Client::new()
        .post(format!("{base}{path}"))
        .bearer_auth(ephemeral_token)
        .body(body)
        .send()
        .await
        .with_context(|| format!("failed to connect to kvrelayd at {base} — is it running?"))?
        .error_for_status()
        .context("datapath request rejected")?;
    Ok(response.bytes().await?.to_vec())
}
