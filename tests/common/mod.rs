#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures::StreamExt;
use mangadex::{ClientConfigBuilder, DexClient};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

pub const PAGE_SIZE: usize = 2048;
/// Bytes `partial.png` sends before the node drops the connection.
pub const PARTIAL_SIZE: usize = 700;
pub const TOKEN: &str = "secret";

#[derive(Clone)]
struct MockState {
    addr: SocketAddr,
    reports: mpsc::UnboundedSender<Value>,
    last_query: Arc<Mutex<Option<String>>>,
}

/// In-process stand-in for the central API, a delivery node under `/node` and
/// the report endpoint under `/report`.
pub struct MockServer {
    pub addr: SocketAddr,
    reports: mpsc::UnboundedReceiver<Value>,
    last_query: Arc<Mutex<Option<String>>>,
}

pub async fn start() -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    let state = MockState {
        addr,
        reports: tx,
        last_query: Arc::new(Mutex::new(None)),
    };
    let last_query = state.last_query.clone();

    let app = Router::new()
        .route("/at-home/server/:id", get(at_home_server))
        .route("/node/:quality/:hash/:file", get(page))
        .route("/report", post(report))
        .route("/manga", get(manga_list))
        .route("/manga/:id", get(manga))
        .route("/manga/:id/aggregate", get(aggregate))
        .route("/manga/:id/feed", get(feed))
        .route("/manga/:id/read", get(read_markers).post(set_read_markers))
        .route("/manga/:id/follow", post(ack).delete(ack))
        .route("/user/follows/manga/:id", get(follows))
        .route("/chapter/:id", get(chapter))
        .with_state(state);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockServer {
        addr,
        reports: rx,
        last_query,
    }
}

impl MockServer {
    pub fn client(&self) -> DexClient {
        self.client_with_report(format!("http://{}/report", self.addr))
    }

    pub fn client_with_report(&self, report_url: String) -> DexClient {
        let config = ClientConfigBuilder::default()
            .api_base(format!("http://{}/", self.addr))
            .report_url(report_url)
            .report_timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        DexClient::with_config(config).unwrap()
    }

    pub async fn next_report(&mut self) -> Value {
        tokio::time::timeout(Duration::from_secs(5), self.reports.recv())
            .await
            .expect("no telemetry report received")
            .expect("report channel closed")
    }

    pub async fn no_report(&mut self) -> bool {
        tokio::time::timeout(Duration::from_millis(300), self.reports.recv())
            .await
            .is_err()
    }

    pub fn last_query(&self) -> Option<String> {
        self.last_query.lock().unwrap().clone()
    }
}

/// Address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "result": "error",
            "errors": [{"id": "e1", "status": 404, "title": "Not found", "detail": null}]
        })),
    )
        .into_response()
}

async fn at_home_server(
    State(state): State<MockState>,
    Path(id): Path<String>,
    RawQuery(query): RawQuery,
) -> Response {
    *state.last_query.lock().unwrap() = query;
    match id.as_str() {
        "abc123" => Json(json!({
            "result": "ok",
            "baseUrl": "https://cdn.example",
            "chapter": {"hash": "h1", "data": ["1.png", "2.png"], "dataSaver": ["1s.png"]}
        }))
        .into_response(),
        "missing" => not_found(),
        "slow" => {
            tokio::time::sleep(Duration::from_secs(10)).await;
            StatusCode::GATEWAY_TIMEOUT.into_response()
        }
        "pages" => Json(json!({
            "result": "ok",
            "baseUrl": format!("http://{}/node", state.addr),
            "chapter": {
                "hash": "h2",
                "data": ["x1-a.png", "x2-b.jpg", "x3-c.png"],
                "dataSaver": ["x1-a.jpg"]
            }
        }))
        .into_response(),
        "dead" => {
            let dead = closed_port().await;
            Json(json!({
                "result": "ok",
                "baseUrl": format!("http://{dead}/node"),
                "chapter": {"hash": "h4", "data": ["1.png"], "dataSaver": []}
            }))
            .into_response()
        }
        "broken" => Json(json!({
            "result": "ok",
            "baseUrl": format!("http://{}/node", state.addr),
            "chapter": {"hash": "h3", "data": ["ok.png", "missing.png"], "dataSaver": []}
        }))
        .into_response(),
        _ => Json(json!({
            "result": "ok",
            "baseUrl": format!("http://{}/node", state.addr),
            "chapter": {
                "hash": "h1",
                "data": ["hit.png", "miss.png", "missing.png", "slow.png"],
                "dataSaver": ["hit.png"]
            }
        }))
        .into_response(),
    }
}

pub fn page_bytes(file: &str) -> Vec<u8> {
    file.bytes().cycle().take(PAGE_SIZE).collect()
}

async fn page(Path((_quality, _hash, file)): Path<(String, String, String)>) -> Response {
    match file.as_str() {
        "missing.png" => (StatusCode::NOT_FOUND, "not found").into_response(),
        "slow.png" => {
            tokio::time::sleep(Duration::from_secs(10)).await;
            (StatusCode::OK, page_bytes(&file)).into_response()
        }
        "partial.png" => {
            let head = page_bytes(&file)[..PARTIAL_SIZE].to_vec();
            let body = futures::stream::iter([Some(head), None]).then(|chunk| async move {
                match chunk {
                    Some(head) => Ok(Bytes::from(head)),
                    None => {
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        Err(std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            "node went away",
                        ))
                    }
                }
            });
            (StatusCode::OK, Body::from_stream(body)).into_response()
        }
        "hit.png" => (
            StatusCode::OK,
            [("X-Cache", "HIT-somehost")],
            page_bytes(&file),
        )
            .into_response(),
        _ => (StatusCode::OK, [("X-Cache", "MISS")], page_bytes(&file)).into_response(),
    }
}

async fn report(State(state): State<MockState>, Json(body): Json<Value>) -> StatusCode {
    let _ = state.reports.send(body);
    StatusCode::OK
}

fn manga_json(id: &str) -> Value {
    json!({
        "id": id,
        "type": "manga",
        "attributes": {
            "title": {"en": "Test Manga"},
            "altTitles": [],
            "description": {"en": "A test"},
            "isLocked": false,
            "links": {},
            "originalLanguage": "ja",
            "lastVolume": "",
            "lastChapter": "",
            "publicationDemographic": null,
            "status": "completed",
            "year": null,
            "contentRating": "safe",
            "tags": [],
            "state": "published",
            "version": 1,
            "createdAt": "2021-01-01T00:00:00+00:00",
            "updatedAt": "2021-01-01T00:00:00+00:00"
        },
        "relationships": []
    })
}

async fn manga_list(State(state): State<MockState>, RawQuery(query): RawQuery) -> Json<Value> {
    *state.last_query.lock().unwrap() = query;
    Json(json!({
        "result": "ok",
        "response": "collection",
        "data": [manga_json("m1"), manga_json("m2")],
        "limit": 2,
        "offset": 0,
        "total": 40
    }))
}

async fn manga(Path(id): Path<String>) -> Response {
    match id.as_str() {
        "missing" => return not_found(),
        "slow" => tokio::time::sleep(Duration::from_secs(10)).await,
        _ => {}
    }
    Json(json!({"result": "ok", "response": "entity", "data": manga_json(&id)})).into_response()
}

async fn aggregate(State(state): State<MockState>, Path(id): Path<String>, RawQuery(query): RawQuery) -> Json<Value> {
    *state.last_query.lock().unwrap() = query;
    if id == "empty" {
        return Json(json!({"result": "ok", "volumes": []}));
    }
    Json(json!({
        "result": "ok",
        "volumes": {
            "1": {"volume": "1", "count": 2, "chapters": {
                "1": {"chapter": "1", "id": "c1", "count": 1, "others": []},
                "2": {"chapter": "2", "id": "c2", "count": 1, "others": []}
            }},
            "none": {"volume": "none", "count": 1, "chapters": {
                "3": {"chapter": "3", "id": "c3", "count": 1, "others": []}
            }}
        }
    }))
}

fn chapter_json(id: &str, number: &str) -> Value {
    json!({
        "id": id,
        "type": "chapter",
        "attributes": {
            "title": "Chapter",
            "volume": "1",
            "chapter": number,
            "pages": 3,
            "translatedLanguage": "en",
            "uploader": null,
            "externalUrl": null,
            "version": 1,
            "createdAt": "2021-01-01T00:00:00+00:00",
            "updatedAt": "2021-01-01T00:00:00+00:00",
            "publishAt": "2021-01-01T00:00:00+00:00",
            "readableAt": "2021-01-01T00:00:00+00:00"
        },
        "relationships": [{"id": "g1", "type": "scanlation_group"}]
    })
}

async fn feed(State(state): State<MockState>, RawQuery(query): RawQuery) -> Json<Value> {
    *state.last_query.lock().unwrap() = query;
    Json(json!({
        "result": "ok",
        "response": "collection",
        "data": [chapter_json("c1", "1"), chapter_json("c2", "2")],
        "limit": 100,
        "offset": 0,
        "total": 2
    }))
}

async fn chapter(Path(id): Path<String>) -> Json<Value> {
    Json(json!({"result": "ok", "response": "entity", "data": chapter_json(&id, "7")}))
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"))
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "result": "error",
            "errors": [{"id": "e2", "status": 401, "title": "Unauthorized", "detail": "token required"}]
        })),
    )
        .into_response()
}

async fn read_markers(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(json!({"result": "ok", "data": ["c1", "c2"]})).into_response()
}

async fn set_read_markers(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    if body["chapterIdsRead"].is_array() && body["chapterIdsUnread"].is_array() {
        Json(json!({"result": "ok"})).into_response()
    } else {
        StatusCode::BAD_REQUEST.into_response()
    }
}

async fn ack(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(json!({"result": "ok"})).into_response()
}

async fn follows(headers: HeaderMap, Path(id): Path<String>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    if id == "followed" {
        Json(json!({"result": "ok"})).into_response()
    } else {
        not_found()
    }
}
