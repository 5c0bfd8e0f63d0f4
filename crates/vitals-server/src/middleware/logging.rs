//! Request logging middleware.

use axum::{body::Body, extract::Request, http::Response};
use futures::future::BoxFuture;
use std::{
    task::{Context, Poll},
    time::Instant,
};
use tower::{Layer, Service};
use tracing::{info, span, Level};
use uuid::Uuid;

/// Request logging layer.
#[derive(Clone, Default)]
pub struct LoggingLayer;

impl LoggingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for LoggingLayer {
    type Service = LoggingMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoggingMiddleware { inner }
    }
}

#[derive(Clone)]
pub struct LoggingMiddleware<S> {
    inner: S,
}

impl<S> Service<Request> for LoggingMiddleware<S>
where
    S: Service<Request, Response = Response<Body>, Error = std::convert::Infallible>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let method = req.method().clone();
            let uri = req.uri().clone();

            let request_id = req
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .map(String::from)
                .unwrap_or_else(|| Uuid::new_v4().to_string());

            let start = Instant::now();

            let span = span!(
                Level::INFO,
                "request",
                request_id = %request_id,
                method = %method,
                path = %uri.path(),
            );
            let _enter = span.enter();

            info!(event = "request_started", method = %method, uri = %uri);

            let response = inner.call(req).await?;

            let duration = start.elapsed();
            info!(
                event = "request_completed",
                status = response.status().as_u16(),
                duration_ms = duration.as_millis() as u64,
            );

            Ok(response)
        })
    }
}
