pub mod atomic_write;
pub mod bootstrap;
pub mod snapshot_read;
pub mod watch;

use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};

/// Every datapath response is a bare wire-encoded message body; the
/// content type is internal, not part of any standard.
pub(crate) fn proto_response(body: Vec<u8>) -> Response {
    let mut response = body.into_response();
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/x-kvrelay"));
    response
}
