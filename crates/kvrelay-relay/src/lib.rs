//! The axum router: one route per datapath endpoint,
//! each POST-only with `Allow: POST` on any other method, plus the bootstrap
//! endpoint at `/`.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod state;

use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

pub use state::ApiState;

/// Every route here is POST-only; any other method hits this instead of
/// axum's default method-not-allowed body, so a proper `Allow: POST` header
/// is always present.
async fn method_not_allowed() -> Response {
    let mut response = axum::http::StatusCode::METHOD_NOT_ALLOWED.into_response();
    response
        .headers_mut()
        .insert(axum::http::header::ALLOW, HeaderValue::from_static("POST"));
    response
}

/// Builds the router. Kept separate from [`serve`] so integration tests can
/// exercise it directly via `tower::ServiceExt::oneshot` without binding a
/// socket.
pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", post(handlers::bootstrap::handle).fallback(method_not_allowed))
        .route(
            "/snapshot_read",
            post(handlers::snapshot_read::handle).fallback(method_not_allowed),
        )
        .route(
            "/kv/snapshot_read",
            post(handlers::snapshot_read::handle).fallback(method_not_allowed),
        )
        .route(
            "/atomic_write",
            post(handlers::atomic_write::handle).fallback(method_not_allowed),
        )
        .route(
            "/kv/atomic_write",
            post(handlers::atomic_write::handle).fallback(method_not_allowed),
        )
        .route("/kv/watch", post(handlers::watch::handle).fallback(method_not_allowed))
        .layer(cors)
        .with_state(state)
}

/// Binds `host:port` and serves the router until the process receives a
/// shutdown signal, draining in-flight requests before returning.
pub async fn serve(
    state: ApiState,
    host: &str,
    port: u16,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    tracing::info!(host, port, "kvrelay listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
