//! Body integrity: verify inbound `HashSHA256`, sign outbound responses.

use crate::state::AppState;
use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};
use vitals_wire::{hash, HASH_HEADER};

/// Verify the request digest when the header is present; a request without
/// the header is passed through unverified. Iff the request carried a hash,
/// the response body is signed with the same key on the way out.
pub async fn layer(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let received = req
        .headers()
        .get(HASH_HEADER)
        .map(|v| v.to_str().unwrap_or_default().to_string());

    let req = match received {
        None => {
            return next.run(req).await;
        }
        Some(received_hash) => {
            // The body at this point is already decompressed; buffer it so
            // the handler can still consume it after verification.
            let (parts, body) = req.into_parts();
            let Ok(bytes) = to_bytes(body, usize::MAX).await else {
                return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
                    .into_response();
            };

            if !hash::verify(&bytes, &state.key, &received_hash) {
                warn!(received = %received_hash, "invalid body hash");
                return (StatusCode::BAD_REQUEST, "invalid hash").into_response();
            }
            debug!("body hash verified");
            Request::from_parts(parts, Body::from(bytes))
        }
    };

    let response = next.run(req).await;

    let (mut parts, body) = response.into_parts();
    let Ok(bytes) = to_bytes(body, usize::MAX).await else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
    };

    let digest = hash::compute(&bytes, &state.key);
    let name = HeaderName::from_bytes(HASH_HEADER.as_bytes()).expect("valid header name");
    if let Ok(value) = HeaderValue::from_str(&digest) {
        parts.headers.insert(name, value);
    }
    Response::from_parts(parts, Body::from(bytes))
}
