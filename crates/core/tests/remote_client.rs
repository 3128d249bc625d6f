//! HTTP client tests against a local axum server standing in for Suwayomi.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tracing_subscriber::fmt::MakeWriter;

use mangasync_core::{
    resolver::{decode_registration, encode_registration},
    testing::fixtures,
    RemoteApi, RemoteError, SuwayomiClient,
};

#[derive(Clone, Default)]
struct Recorded {
    imports: Arc<Mutex<Vec<Vec<u8>>>>,
    installs: Arc<Mutex<Vec<String>>>,
    queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
}

async fn source(Path(id): Path<i64>) -> impl IntoResponse {
    match id {
        1 => Json(json!({ "id": "1", "name": "MangaDex" })).into_response(),
        2 => Json(json!({ "id": "2", "name": "" })).into_response(),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "no such source").into_response(),
    }
}

async fn category(Path(id): Path<u32>) -> impl IntoResponse {
    if id != 0 {
        return (StatusCode::NOT_FOUND, "category not found").into_response();
    }
    Json(json!([
        {
            "id": 10,
            "url": "/title/abc",
            "sourceId": "1",
            "title": "Server side title",
            "author": "Someone",
            "genre": ["Action"],
            "status": "COMPLETED",
            "inLibrary": true
        }
    ]))
    .into_response()
}

async fn install(State(rec): State<Recorded>, Path(package): Path<String>) -> StatusCode {
    rec.installs.lock().unwrap().push(package);
    StatusCode::OK
}

async fn import(State(rec): State<Recorded>, body: Bytes) -> impl IntoResponse {
    if !body.starts_with(&[0x1f, 0x8b]) {
        return (StatusCode::BAD_REQUEST, "not a gzip backup").into_response();
    }
    rec.imports.lock().unwrap().push(body.to_vec());
    StatusCode::OK.into_response()
}

async fn chapters(
    State(rec): State<Recorded>,
    Path(_id): Path<i64>,
    Query(query): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    rec.queries.lock().unwrap().push(query);
    Json(json!([
        { "index": 2, "name": "Chapter 2", "pageCount": -1 },
        { "index": 1, "name": "Chapter 1", "pageCount": -1 }
    ]))
}

async fn chapter(Path((id, index)): Path<(i64, i64)>) -> impl IntoResponse {
    if id == 98 {
        return broken_json().await.into_response();
    }
    Json(json!({ "index": index, "name": format!("Chapter {}", index), "pageCount": 3 }))
        .into_response()
}

async fn page(Path((_id, _index, page)): Path<(i64, i64, i64)>) -> impl IntoResponse {
    match page {
        // Mislabelled PNG
        0 => (
            [(header::CONTENT_TYPE, "application/octet-stream")],
            fixtures::png_bytes(0),
        )
            .into_response(),
        1 => ([(header::CONTENT_TYPE, "image/webp")], Vec::<u8>::new()).into_response(),
        _ => (StatusCode::BAD_GATEWAY, "upstream timed out").into_response(),
    }
}

async fn thumbnail(Path(id): Path<i64>) -> impl IntoResponse {
    if id == 99 {
        return broken_json().await.into_response();
    }
    ([(header::CONTENT_TYPE, "image/x-custom")], b"opaque".to_vec()).into_response()
}

async fn broken_json() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/json")], "{ not json")
}

/// Collects formatted log output of the current thread.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let logs = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}

async fn start_server(rec: Recorded) -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let app = Router::new()
        .route("/api/v1/settings/about", get(|| async { StatusCode::SERVICE_UNAVAILABLE }))
        .route("/api/v1/source/{id}", get(source))
        .route("/api/v1/extension/list", get(|| async { Json(json!([])) }))
        .route("/api/v1/extension/install/{package}", get(install))
        .route("/api/v1/category/{id}", get(category))
        .route("/api/v1/backup/import", post(import))
        .route("/api/v1/manga/{id}/chapters", get(chapters))
        .route("/api/v1/manga/{id}/chapter/{index}", get(chapter))
        .route("/api/v1/manga/{id}/chapter/{index}/page/{page}", get(page))
        .route("/api/v1/manga/{id}/thumbnail", get(thumbnail))
        .with_state(rec);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, handle)
}

async fn client() -> (SuwayomiClient, Recorded) {
    let rec = Recorded::default();
    let (addr, _handle) = start_server(rec.clone()).await;
    // Trailing slash left off on purpose; the client adds it.
    let client = SuwayomiClient::new(&format!("http://{}", addr), None).unwrap();
    (client, rec)
}

#[tokio::test]
async fn test_ping_ignores_status() {
    let (client, _) = client().await;
    client.ping().await.unwrap();
}

#[tokio::test]
async fn test_source_installed_and_missing() {
    let (client, _) = client().await;

    assert!(client.source(1).await.unwrap().is_installed());
    assert!(!client.source(2).await.unwrap().is_installed());

    let err = client.source(3).await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert!(err.to_string().contains("no such source"));
}

#[tokio::test]
async fn test_library_decodes_and_ignores_extra_fields() {
    let (client, _) = client().await;

    let library = client.library(0).await.unwrap();
    assert_eq!(library.len(), 1);
    assert!(library[0].matches(1, "/title/abc"));
    assert_eq!(library[0].genres, Some(vec!["Action".to_string()]));
    assert_eq!(library[0].artist, None);

    let err = client.library(5).await.unwrap_err();
    assert!(matches!(err, RemoteError::Server { status: 404, ref body, .. } if body == "category not found"));
}

#[tokio::test]
async fn test_install_encodes_package_name() {
    let (client, rec) = client().await;

    client.refresh_extensions().await.unwrap();
    client
        .install_extension("eu.kanade.tachiyomi.extension.all.foo bar")
        .await
        .unwrap();

    assert_eq!(
        *rec.installs.lock().unwrap(),
        vec!["eu.kanade.tachiyomi.extension.all.foo bar".to_string()]
    );
}

#[tokio::test]
async fn test_import_posts_raw_backup() {
    let (client, rec) = client().await;

    let payload = encode_registration(1, "/title/abc").unwrap();
    client.import_backup(payload.clone()).await.unwrap();

    let imports = rec.imports.lock().unwrap().clone();
    assert_eq!(imports, vec![payload]);
    assert_eq!(
        decode_registration(&imports[0]).unwrap(),
        vec![(1, "/title/abc".to_string())]
    );
}

#[tokio::test]
async fn test_rejected_import_carries_body() {
    let (client, rec) = client().await;

    let err = client.import_backup(b"plain".to_vec()).await.unwrap_err();
    assert!(matches!(
        err,
        RemoteError::Server { status: 400, ref body, .. } if body == "not a gzip backup"
    ));
    assert!(rec.imports.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_requests_are_logged_at_debug() {
    let (client, _) = client().await;
    let (logs, _guard) = capture_logs();

    client.ping().await.unwrap();
    let payload = encode_registration(1, "/title/abc").unwrap();
    client.import_backup(payload).await.unwrap();

    let logs = logs.contents();
    assert!(logs.contains("v1/settings/about"), "{}", logs);
    assert!(logs.contains("v1/backup/import"), "{}", logs);
    // Import is announced by the resolver; the client stays at debug.
    assert!(!logs.contains(" INFO "), "{}", logs);
}

#[tokio::test]
async fn test_chapters_request_online_fetch() {
    let (client, rec) = client().await;

    let chapters = client.chapters(10).await.unwrap();
    assert_eq!(chapters.len(), 2);
    assert_eq!(chapters[0].page_count, -1);

    let queries = rec.queries.lock().unwrap().clone();
    assert_eq!(queries[0].get("onlineFetch").map(String::as_str), Some("true"));

    let detail = client.chapter(10, 2).await.unwrap();
    assert_eq!(detail.index, 2);
    assert_eq!(detail.page_count, 3);
}

#[tokio::test]
async fn test_invalid_json_is_a_decode_error() {
    let (client, _) = client().await;

    let err = client.chapter(98, 1).await.unwrap_err();
    assert!(matches!(err, RemoteError::Decode { .. }));
}

#[tokio::test]
async fn test_page_mime_is_sniffed() {
    let (client, _) = client().await;

    let image = client.page(10, 1, 0).await.unwrap();
    assert_eq!(image.mime, "image/png");
    assert_eq!(image.bytes, fixtures::png_bytes(0));
}

#[tokio::test]
async fn test_empty_page_is_an_error() {
    let (client, _) = client().await;

    let err = client.page(10, 1, 1).await.unwrap_err();
    assert!(matches!(err, RemoteError::EmptyBody { .. }));
}

#[tokio::test]
async fn test_page_error_status_carries_body() {
    let (client, _) = client().await;

    let err = client.page(10, 1, 2).await.unwrap_err();
    assert!(matches!(
        err,
        RemoteError::Server { status: 502, ref body, .. } if body == "upstream timed out"
    ));
}

#[tokio::test]
async fn test_unknown_thumbnail_keeps_declared_type() {
    let (client, _) = client().await;

    let image = client.thumbnail(10).await.unwrap();
    assert_eq!(image.mime, "image/x-custom");
    assert_eq!(image.bytes, b"opaque");

    // Declared type wins for any content `infer` does not recognise.
    let image = client.thumbnail(99).await.unwrap();
    assert_eq!(image.mime, "application/json");
}
