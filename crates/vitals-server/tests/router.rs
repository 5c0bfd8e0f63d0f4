//! End-to-end scenarios against the assembled router.

use axum::{
    body::{to_bytes, Body, Bytes},
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use vitals_common_async::ShutdownHandle;
use vitals_core::{Metric, MetricStore};
use vitals_database::{DatabasePoolConfig, DatabaseStore};
use vitals_server::{routes::create_router, AppState, Store};
use vitals_storage::{MemoryStore, SnapshotManager};
use vitals_wire::{gzip, hash, HASH_HEADER};

const TIMEOUT: Duration = Duration::from_secs(5);

fn memory_router(key: &str) -> Router {
    let state = AppState::for_memory(Arc::new(MemoryStore::new()), key, false);
    create_router(state, TIMEOUT)
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body)
}

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, json: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn gauge_path_update_then_read() {
    let router = memory_router("");

    let (status, _, _) = send(&router, post("/update/gauge/Temp/23.5")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, body) = send(&router, get("/value/gauge/Temp")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"23.5");
}

#[tokio::test]
async fn counter_updates_accumulate() {
    let router = memory_router("");

    let (status, _, _) = send(&router, post("/update/counter/Hits/3")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(&router, post("/update/counter/Hits/5")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, body) = send(&router, get("/value/counter/Hits")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"8");
}

#[tokio::test]
async fn batch_ingestion() {
    let router = memory_router("");

    let batch = r#"[{"id":"A","type":"gauge","value":1.5},{"id":"B","type":"counter","delta":2}]"#;
    let (status, _, _) = send(&router, post_json("/updates/", batch)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, _, body) = send(&router, get("/value/gauge/A")).await;
    assert_eq!(&body[..], b"1.5");
    let (_, _, body) = send(&router, get("/value/counter/B")).await;
    assert_eq!(&body[..], b"2");
}

#[tokio::test]
async fn validation_rejects_bad_values() {
    let router = memory_router("");

    let (status, _, _) = send(&router, post("/update/gauge/X/not-a-number")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(&router, get("/value/gauge/X")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = send(&router, post("/update/histogram/X/1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(&router, post_json("/update/", r#"{"id":"X","type":"counter"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "counter without delta");

    let (status, _, _) = send(&router, post_json("/update/", "not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn json_update_echoes_stored_record() {
    let router = memory_router("");

    let (status, _, body) = send(
        &router,
        post_json("/update/", r#"{"id":"Temp","type":"gauge","value":23.5}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let echoed: Metric = serde_json::from_slice(&body).unwrap();
    assert_eq!(echoed, Metric::gauge("Temp", 23.5));

    // Counter echo carries the accumulated value.
    send(&router, post_json("/update/", r#"{"id":"C","type":"counter","delta":2}"#)).await;
    let (_, _, body) = send(
        &router,
        post_json("/update/", r#"{"id":"C","type":"counter","delta":3}"#),
    )
    .await;
    let echoed: Metric = serde_json::from_slice(&body).unwrap();
    assert_eq!(echoed.delta, Some(5));
}

#[tokio::test]
async fn json_value_read() {
    let router = memory_router("");
    send(&router, post("/update/gauge/Temp/23.5")).await;

    let (status, _, body) = send(
        &router,
        post_json("/value/", r#"{"id":"Temp","type":"gauge"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let record: Metric = serde_json::from_slice(&body).unwrap();
    assert_eq!(record, Metric::gauge("Temp", 23.5));

    let (status, _, _) = send(
        &router,
        post_json("/value/", r#"{"id":"Absent","type":"counter"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn hmac_mismatch_is_rejected() {
    let router = memory_router("k");
    let body = r#"{"id":"G","type":"gauge","value":1.0}"#;

    let bogus = "0".repeat(64);
    let request = Request::builder()
        .method("POST")
        .uri("/update/")
        .header(header::CONTENT_TYPE, "application/json")
        .header(HASH_HEADER, bogus)
        .body(Body::from(body))
        .unwrap();
    let (status, _, _) = send(&router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let digest = hash::compute(body.as_bytes(), "k");
    let request = Request::builder()
        .method("POST")
        .uri("/update/")
        .header(header::CONTENT_TYPE, "application/json")
        .header(HASH_HEADER, &digest)
        .body(Body::from(body))
        .unwrap();
    let (status, headers, response_body) = send(&router, request).await;
    assert_eq!(status, StatusCode::OK);

    // A signed request gets a signed response.
    let response_digest = headers.get(HASH_HEADER).unwrap().to_str().unwrap();
    assert!(hash::verify(&response_body, "k", response_digest));
}

#[tokio::test]
async fn unsigned_requests_skip_verification() {
    let router = memory_router("k");
    let (status, headers, _) =
        send(&router, post_json("/update/", r#"{"id":"G","type":"gauge","value":1.0}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.get(HASH_HEADER).is_none());
}

#[tokio::test]
async fn gzip_request_bodies_are_transparent() {
    let router = memory_router("");

    let plain = r#"[{"id":"Z","type":"gauge","value":7.25}]"#;
    let packed = gzip::compress(plain.as_bytes()).unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/updates/")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_ENCODING, "gzip")
        .body(Body::from(packed))
        .unwrap();
    let (status, _, _) = send(&router, request).await;
    assert_eq!(status, StatusCode::OK);

    let (_, _, body) = send(&router, get("/value/gauge/Z")).await;
    assert_eq!(&body[..], b"7.25");
}

#[tokio::test]
async fn responses_compress_when_accepted() {
    let router = memory_router("");
    send(&router, post("/update/gauge/Temp/23.5")).await;

    let request = Request::builder()
        .method("GET")
        .uri("/value/gauge/Temp")
        .header(header::ACCEPT_ENCODING, "gzip")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(&router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get(header::CONTENT_ENCODING).unwrap(), "gzip");
    assert_eq!(gzip::decompress(&body).unwrap(), b"23.5");
}

#[tokio::test]
async fn error_responses_stay_uncompressed() {
    let router = memory_router("");

    let request = Request::builder()
        .method("GET")
        .uri("/value/gauge/Missing")
        .header(header::ACCEPT_ENCODING, "gzip")
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = send(&router, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(headers.get(header::CONTENT_ENCODING).is_none());
}

#[tokio::test]
async fn signed_compressed_report_round_trip() {
    // The agent's exact wire shape: JSON, hashed uncompressed, shipped
    // compressed.
    let router = memory_router("secret");
    let json = serde_json::to_vec(&vec![
        Metric::gauge("Alloc", 1024.0),
        Metric::counter("PollCount", 1),
    ])
    .unwrap();
    let digest = hash::compute(&json, "secret");
    let packed = gzip::compress(&json).unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/updates")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_ENCODING, "gzip")
        .header(HASH_HEADER, &digest)
        .body(Body::from(packed))
        .unwrap();
    let (status, _, _) = send(&router, request).await;
    assert_eq!(status, StatusCode::OK);

    let (_, _, body) = send(&router, get("/value/counter/PollCount")).await;
    assert_eq!(&body[..], b"1");
}

#[tokio::test]
async fn index_lists_metrics() {
    let router = memory_router("");
    send(&router, post("/update/gauge/Temp/23.5")).await;
    send(&router, post("/update/counter/Hits/3")).await;

    let (status, headers, body) = send(&router, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    let page = String::from_utf8(body.to_vec()).unwrap();
    assert!(page.contains("Temp: 23.5"));
    assert!(page.contains("Hits: 3"));
}

#[tokio::test]
async fn ping_route_only_exists_for_database_backend() {
    let router = memory_router("");
    let (status, _, _) = send(&router, get("/ping")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let db = DatabaseStore::new(&DatabasePoolConfig::in_memory())
        .await
        .unwrap();
    let state = AppState {
        store: Store::Database(Arc::new(db)),
        key: String::new(),
        notify_on_update: false,
        retry_policy: Default::default(),
        shutdown: ShutdownHandle::new(),
    };
    let router = create_router(state, TIMEOUT);
    let (status, _, body) = send(&router, get("/ping")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"OK");
}

#[tokio::test]
async fn database_backend_serves_the_same_surface() {
    let db = DatabaseStore::new(&DatabasePoolConfig::in_memory())
        .await
        .unwrap();
    let state = AppState {
        store: Store::Database(Arc::new(db)),
        key: String::new(),
        notify_on_update: false,
        retry_policy: Default::default(),
        shutdown: ShutdownHandle::new(),
    };
    let router = create_router(state, TIMEOUT);

    send(&router, post("/update/counter/Hits/3")).await;
    send(&router, post("/update/counter/Hits/5")).await;
    let (status, _, body) = send(&router, get("/value/counter/Hits")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"8");
}

#[tokio::test]
async fn snapshot_restore_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics-db.json");

    // First process: synchronous snapshots, one gauge write.
    {
        let store = Arc::new(MemoryStore::new());
        let updates = store.take_update_notifications().unwrap();
        let shutdown = ShutdownHandle::new();
        let worker = tokio::spawn(
            SnapshotManager::new(store.clone(), &path).run_sync(updates, shutdown.clone()),
        );

        let state = AppState::for_memory(store, "", true);
        let router = create_router(state, TIMEOUT);
        let (status, _, _) = send(&router, post("/update/gauge/G/4.2")).await;
        assert_eq!(status, StatusCode::OK);

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.shutdown();
        worker.await.unwrap();
    }

    // Second process: restore on startup, read the value back.
    {
        let store = Arc::new(MemoryStore::new());
        SnapshotManager::new(store.clone(), &path).restore().unwrap();
        assert_eq!(store.get_gauge("G").await.unwrap(), 4.2);

        let router = create_router(AppState::for_memory(store, "", false), TIMEOUT);
        let (status, _, body) = send(&router, get("/value/gauge/G")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], b"4.2");
    }
}
