//! gzip request decoding and response encoding.

use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, error};
use vitals_wire::gzip;

fn header_mentions_gzip(value: Option<&HeaderValue>) -> bool {
    value
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("gzip"))
}

/// Decode gzip request bodies and gzip-encode 2xx responses for clients
/// that accept it.
pub async fn layer(req: Request, next: Next) -> Response {
    let accepts_gzip = header_mentions_gzip(req.headers().get(header::ACCEPT_ENCODING));
    let sends_gzip = header_mentions_gzip(req.headers().get(header::CONTENT_ENCODING));

    let req = if sends_gzip {
        let (mut parts, body) = req.into_parts();
        let Ok(compressed) = to_bytes(body, usize::MAX).await else {
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
        };
        match gzip::decompress(&compressed) {
            Ok(plain) => {
                debug!("request decompressed");
                parts.headers.remove(header::CONTENT_ENCODING);
                parts.headers.remove(header::CONTENT_LENGTH);
                Request::from_parts(parts, Body::from(plain))
            }
            Err(e) => {
                error!(%e, "failed to decompress request");
                return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
                    .into_response();
            }
        }
    } else {
        req
    };

    let response = next.run(req).await;

    // Only successful responses are compressed; errors go out plain.
    if !accepts_gzip || !response.status().is_success() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let Ok(plain) = to_bytes(body, usize::MAX).await else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
    };
    match gzip::compress(&plain) {
        Ok(packed) => {
            parts
                .headers
                .insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
            parts.headers.remove(header::CONTENT_LENGTH);
            Response::from_parts(parts, Body::from(packed))
        }
        Err(e) => {
            // Compression failure is not worth failing the request over.
            error!(%e, "failed to compress response, sending plain");
            parts.headers.remove(header::CONTENT_LENGTH);
            Response::from_parts(parts, Body::from(plain))
        }
    }
}
