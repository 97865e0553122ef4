//! The single error type datapath handlers return, and its HTTP mapping.
//! Every decode failure gets logged with `tracing::warn!`; nothing here is
//! fatal to the process.

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use kvrelay_core::{KeyCodecError, WireError};
use kvrelay_engine::{EngineError, ValueCodecError};
use kvrelay_proto::ProtoError;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("missing or invalid bearer token")]
    Unauthorized,

    #[error("unknown path")]
    NotFound,

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("malformed request: {0}")]
    BadRequest(String),

    #[error("unsupported selector: start.mode = before")]
    UnsupportedSelector,

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

impl From<WireError> for RelayError {
    fn from(err: WireError) -> Self {
        RelayError::BadRequest(format!("wire decode failure: {err}"))
    }
}

impl From<ProtoError> for RelayError {
    fn from(err: ProtoError) -> Self {
        RelayError::BadRequest(format!("message decode failure: {err}"))
    }
}

impl From<KeyCodecError> for RelayError {
    fn from(err: KeyCodecError) -> Self {
        RelayError::BadRequest(format!("key decode failure: {err}"))
    }
}

impl From<ValueCodecError> for RelayError {
    fn from(err: ValueCodecError) -> Self {
        RelayError::BadRequest(format!("value decode failure: {err}"))
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        match self {
            RelayError::Unauthorized => {
                let mut response = StatusCode::UNAUTHORIZED.into_response();
                response.headers_mut().insert(
                    axum::http::header::WWW_AUTHENTICATE,
                    HeaderValue::from_static("Bearer"),
                );
                response
            }
            RelayError::NotFound => StatusCode::NOT_FOUND.into_response(),
            RelayError::MethodNotAllowed => {
                let mut response = StatusCode::METHOD_NOT_ALLOWED.into_response();
                response
                    .headers_mut()
                    .insert(axum::http::header::ALLOW, HeaderValue::from_static("POST"));
                response
            }
            RelayError::BadRequest(message) => {
                tracing::warn!(%message, "rejecting request");
                (StatusCode::BAD_REQUEST, message).into_response()
            }
            RelayError::UnsupportedSelector => {
                tracing::warn!("rejecting unsupported selector: start.mode = before");
                (StatusCode::BAD_REQUEST, "unsupported selector").into_response()
            }
            RelayError::Engine(err) => {
                tracing::warn!(error = %err, "engine error during request");
                (StatusCode::BAD_REQUEST, err.to_string()).into_response()
            }
        }
    }
}
