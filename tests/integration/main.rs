//! End-to-end HTTP tests against a real `axum::Router` bound to an ephemeral
//! port, fronting a fresh `MemoryEngine` per test. Each test owns its own
//! relay instance, so tests run in parallel without interfering.

mod scenarios;
mod surface;

use std::sync::Arc;
use std::time::Duration;

use kvrelay_engine::{Engine, MemoryEngine};
use kvrelay_relay::ApiState;
use tokio::sync::oneshot;
use uuid::Uuid;

pub const ACCESS_TOKEN: &str = "operator-secret";

/// A running relay instance plus the means to shut it down cleanly.
pub struct Harness {
    pub base: String,
    pub database_id: Uuid,
    shutdown: Option<oneshot::Sender<()>>,
    server: Option<tokio::task::JoinHandle<()>>,
}

impl Harness {
    pub async fn spawn() -> Self {
        Self::spawn_with_ttl(Duration::from_secs(3600)).await
    }

    pub async fn spawn_with_ttl(ephemeral_token_ttl: Duration) -> Self {
        let engine: Arc<dyn Engine> = Arc::new(MemoryEngine::new());
        let database_id = Uuid::new_v4();
        let state = ApiState::new(engine, database_id, ACCESS_TOKEN, ephemeral_token_ttl);
        let app = kvrelay_relay::router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("binding an ephemeral port never fails in tests");
        let addr = listener.local_addr().expect("bound listener has a local address");

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("serving the test router never fails");
        });

        Harness {
            base: format!("http://{addr}"),
            database_id,
            shutdown: Some(shutdown_tx),
            server: Some(server),
        }
    }

    /// Trades the access token for an ephemeral one via the bootstrap route.
    pub async fn bootstrap(&self) -> String {
        self.bootstrap_with_token(ACCESS_TOKEN).await.expect("bootstrap should succeed")
    }

    pub async fn bootstrap_with_token(&self, access_token: &str) -> reqwest::Result<String> {
        let response = reqwest::Client::new()
            .post(&self.base)
            .bearer_auth(access_token)
            .send()
            .await?
            .error_for_status()?;
        let body: serde_json::Value = response.json().await?;
        Ok(body["token"].as_str().expect("bootstrap always includes a token").to_string())
    }

    pub async fn post_wire(&self, path: &str, token: &str, body: Vec<u8>) -> reqwest::Response {
        reqwest::Client::new()
            .post(format!("{}{path}", self.base))
            .bearer_auth(token)
            .body(body)
            .send()
            .await
            .expect("request should reach the test server")
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(server) = self.server.take() {
            server.await.expect("server task should not panic");
        }
    }
}
