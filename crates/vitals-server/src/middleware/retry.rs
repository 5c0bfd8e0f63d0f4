//! Replay of requests whose handler hit a transient downstream failure.

use crate::error::TransientFailure;
use axum::{
    body::{to_bytes, Body, Bytes},
    extract::Request,
    http::{request::Parts, Response, StatusCode},
};
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use tower::{Layer, Service, ServiceExt};
use tracing::warn;
use vitals_common_async::{RetryPolicy, ShutdownHandle};

/// Retry layer: buffers the request body and re-dispatches the request to a
/// fresh clone of the inner service while responses carry the
/// [`TransientFailure`] marker, up to the configured attempt budget.
#[derive(Clone)]
pub struct RetryLayer {
    policy: RetryPolicy,
    shutdown: ShutdownHandle,
}

impl RetryLayer {
    pub fn new(policy: RetryPolicy, shutdown: ShutdownHandle) -> Self {
        Self { policy, shutdown }
    }
}

impl<S> Layer<S> for RetryLayer {
    type Service = RetryMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RetryMiddleware {
            inner,
            policy: self.policy,
            shutdown: self.shutdown.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RetryMiddleware<S> {
    inner: S,
    policy: RetryPolicy,
    shutdown: ShutdownHandle,
}

impl<S> Service<Request> for RetryMiddleware<S>
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
        let policy = self.policy;
        let shutdown = self.shutdown.clone();

        Box::pin(async move {
            let (parts, body) = req.into_parts();
            let Ok(bytes) = to_bytes(body, usize::MAX).await else {
                return Ok(plain_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error",
                ));
            };

            let mut delay = policy.initial_delay;
            let mut last_response = None;

            for attempt in 1..=policy.max_attempts {
                let request = rebuild_request(&parts, bytes.clone());
                let response = inner.ready().await?.call(request).await?;

                if response.extensions().get::<TransientFailure>().is_none() {
                    return Ok(response);
                }

                warn!(attempt, path = %parts.uri.path(), "transient failure, replaying request");
                last_response = Some(response);

                if attempt < policy.max_attempts {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown.cancelled() => break,
                    }
                    delay += policy.delay_increment;
                }
            }

            Ok(last_response.expect("at least one attempt ran"))
        })
    }
}

/// Reconstruct a request from buffered parts. Extensions do not survive the
/// replay; nothing upstream of this layer relies on them.
fn rebuild_request(parts: &Parts, bytes: Bytes) -> Request {
    let mut request = axum::http::Request::builder()
        .method(parts.method.clone())
        .uri(parts.uri.clone())
        .version(parts.version)
        .body(Body::from(bytes))
        .expect("request parts were valid");
    *request.headers_mut() = parts.headers.clone();
    request
}

fn plain_response(status: StatusCode, body: &'static str) -> Response<Body> {
    Response::builder()
        .status(status)
        .body(Body::from(body))
        .expect("static response is valid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Clone)]
    struct FlakyService {
        calls: Arc<AtomicU32>,
        fail_first: u32,
    }

    impl Service<Request> for FlakyService {
        type Response = Response<Body>;
        type Error = std::convert::Infallible;
        type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

        fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _req: Request) -> Self::Future {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let fail = n <= self.fail_first;
            Box::pin(async move {
                if fail {
                    let mut response =
                        plain_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
                    response.extensions_mut().insert(TransientFailure);
                    Ok(response)
                } else {
                    Ok(plain_response(StatusCode::OK, "ok"))
                }
            })
        }
    }

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts: attempts,
            initial_delay: Duration::from_millis(1),
            delay_increment: Duration::from_millis(1),
        }
    }

    async fn run(service: FlakyService, attempts: u32) -> Response<Body> {
        let layer = RetryLayer::new(fast_policy(attempts), ShutdownHandle::new());
        let mut wrapped = layer.layer(service);
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/updates")
            .body(Body::from("[]"))
            .unwrap();
        wrapped.ready().await.unwrap().call(request).await.unwrap()
    }

    #[tokio::test]
    async fn replays_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let service = FlakyService {
            calls: calls.clone(),
            fail_first: 2,
        };

        let response = run(service, 3).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_attempt_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let service = FlakyService {
            calls: calls.clone(),
            fail_first: u32::MAX,
        };

        let response = run(service, 3).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn clean_responses_pass_through_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let service = FlakyService {
            calls: calls.clone(),
            fail_first: 0,
        };

        let response = run(service, 3).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
