//! In-process REST backend shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub const TOKEN: &str = "tok-123";

#[derive(Clone, Default)]
pub struct Backend {
    pub hits: Arc<AtomicUsize>,
}

impl Backend {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    let expected = format!("Bearer {}", TOKEN);
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(expected.as_str())
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "message": "invalid token" })),
    )
        .into_response()
}

async fn list_cases(State(backend): State<Backend>, headers: HeaderMap) -> Response {
    backend.hits.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(json!({
        "cases": [
            { "_id": "c1", "title": "Lease dispute", "status": "open", "budget": 1200 },
            { "_id": "c2", "title": "Will drafting", "status": "pending" },
            { "_id": "c3", "title": "Patent filing", "status": "completed", "budget": 5000.5 }
        ]
    }))
    .into_response()
}

async fn create_case(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    backend.hits.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return unauthorized();
    }
    let mut case = body;
    case["_id"] = json!("c-new");
    case["status"] = json!("open");
    (StatusCode::CREATED, Json(json!({ "case": case }))).into_response()
}

async fn get_case(Path(id): Path<String>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    if id != "c1" {
        return (StatusCode::NOT_FOUND, Json(json!({ "message": "no such case" }))).into_response();
    }
    Json(json!({ "_id": "c1", "title": "Lease dispute", "status": "open" })).into_response()
}

async fn list_lawyers() -> Json<Value> {
    Json(json!([
        { "_id": "l1", "name": "Ada Park", "specialization": "Family", "averageRating": 4.5, "ratingCount": 2 },
        { "_id": "l2", "name": "Ben Ortiz" }
    ]))
}

async fn list_conversations() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": "database offline" })),
    )
        .into_response()
}

async fn send_message(
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(json!({
        "message": {
            "_id": "m1",
            "conversationId": id,
            "senderId": "u1",
            "content": body["body"]
        }
    }))
    .into_response()
}

async fn calendar(
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if query.get("token").map(String::as_str) != Some(TOKEN) {
        return unauthorized();
    }
    (
        [(header::CONTENT_TYPE, "text/calendar")],
        format!("BEGIN:VCALENDAR\nUID:{}\nEND:VCALENDAR\n", id),
    )
        .into_response()
}

/// Starts the backend and returns its API base URL.
pub async fn spawn_backend() -> (String, Backend) {
    let backend = Backend::default();
    let app = Router::new()
        .route("/api/cases", get(list_cases).post(create_case))
        .route("/api/cases/{id}", get(get_case))
        .route("/api/lawyers", get(list_lawyers))
        .route("/api/conversations", get(list_conversations))
        .route(
            "/api/conversations/{id}/messages",
            axum::routing::post(send_message),
        )
        .route("/api/appointments/{id}/calendar.ics", get(calendar))
        .with_state(backend.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (format!("http://{}/api", addr), backend)
}
