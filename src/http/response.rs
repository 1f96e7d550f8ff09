//! Response construction helpers.

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Routing misses and upstream failures both surface as 502 to the caller.
pub fn bad_gateway(reason: &'static str) -> Response {
    (StatusCode::BAD_GATEWAY, reason).into_response()
}

/// Re-body an upstream response so axum streams it to the client.
pub fn from_upstream(response: hyper::Response<hyper::body::Incoming>) -> Response {
    let (parts, body) = response.into_parts();
    Response::from_parts(parts, Body::new(body))
}
