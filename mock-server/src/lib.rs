use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: Uuid,
    pub title: String,
    pub instructor: String,
    pub duration_minutes: u32,
}

#[derive(Deserialize)]
pub struct CreateLesson {
    pub title: String,
    pub instructor: String,
    #[serde(default = "default_duration")]
    pub duration_minutes: u32,
}

fn default_duration() -> u32 {
    30
}

#[derive(Deserialize)]
pub struct UpdateLesson {
    pub title: Option<String>,
    pub instructor: Option<String>,
    pub duration_minutes: Option<u32>,
}

#[derive(Deserialize)]
pub struct StatusQuery {
    pub message: Option<String>,
}

#[derive(Default)]
pub struct AppState {
    lessons: RwLock<HashMap<Uuid, Lesson>>,
    hits: AtomicU64,
}

pub type Shared = Arc<AppState>;

pub fn app() -> Router {
    let state: Shared = Arc::new(AppState::default());
    Router::new()
        .route("/lessons", get(list_lessons).post(create_lesson))
        .route(
            "/lessons/{id}",
            get(get_lesson)
                .put(update_lesson)
                .patch(update_lesson)
                .delete(delete_lesson),
        )
        .route("/status/{code}", get(status).post(status))
        .route("/slow/{ms}", get(slow))
        .route("/whoami", get(whoami))
        .route("/counter", get(counter))
        .route("/upload", post(upload))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "message": "Lesson not found" })),
    )
}

async fn list_lessons(State(state): State<Shared>) -> Json<Vec<Lesson>> {
    let lessons = state.lessons.read().await;
    let mut all: Vec<Lesson> = lessons.values().cloned().collect();
    all.sort_by(|a, b| a.title.cmp(&b.title));
    Json(all)
}

async fn create_lesson(
    State(state): State<Shared>,
    Json(input): Json<CreateLesson>,
) -> Result<(StatusCode, Json<Lesson>), (StatusCode, Json<Value>)> {
    if input.title.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Title is required", "field": "title" })),
        ));
    }
    let lesson = Lesson {
        id: Uuid::new_v4(),
        title: input.title,
        instructor: input.instructor,
        duration_minutes: input.duration_minutes,
    };
    state.lessons.write().await.insert(lesson.id, lesson.clone());
    Ok((StatusCode::CREATED, Json(lesson)))
}

async fn get_lesson(
    State(state): State<Shared>,
    Path(id): Path<Uuid>,
) -> Result<Json<Lesson>, (StatusCode, Json<Value>)> {
    let lessons = state.lessons.read().await;
    lessons.get(&id).cloned().map(Json).ok_or_else(not_found)
}

async fn update_lesson(
    State(state): State<Shared>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateLesson>,
) -> Result<Json<Lesson>, (StatusCode, Json<Value>)> {
    let mut lessons = state.lessons.write().await;
    let lesson = lessons.get_mut(&id).ok_or_else(not_found)?;
    if let Some(title) = input.title {
        lesson.title = title;
    }
    if let Some(instructor) = input.instructor {
        lesson.instructor = instructor;
    }
    if let Some(duration) = input.duration_minutes {
        lesson.duration_minutes = duration;
    }
    Ok(Json(lesson.clone()))
}

async fn delete_lesson(
    State(state): State<Shared>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    let mut lessons = state.lessons.write().await;
    lessons
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(not_found)
}

/// Answer with any status. `?message=` becomes the body's `message` field.
async fn status(
    Path(code): Path<u16>,
    Query(query): Query<StatusQuery>,
) -> (StatusCode, Json<Value>) {
    let Ok(status) = StatusCode::from_u16(code) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": format!("invalid status {code}") })),
        );
    };
    let body = match query.message {
        Some(message) => json!({ "message": message, "status": code }),
        None => json!({ "status": code }),
    };
    (status, Json(body))
}

async fn slow(Path(ms): Path<u64>) -> Json<Value> {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    Json(json!({ "delayed_ms": ms }))
}

/// Echo the `Authorization` header, or 401 without one.
async fn whoami(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    match headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        Some(auth) => (StatusCode::OK, Json(json!({ "authorization": auth }))),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Authentication required" })),
        ),
    }
}

/// Counts every request it serves; used to observe client-side caching.
async fn counter(State(state): State<Shared>) -> Json<Value> {
    let hits = state.hits.fetch_add(1, Ordering::SeqCst) + 1;
    Json(json!({ "hits": hits }))
}

/// Summarize a multipart upload: text fields by name, files by metadata.
async fn upload(mut multipart: Multipart) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let bad_request = |e: axum::extract::multipart::MultipartError| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": e.to_string() })),
        )
    };

    let mut fields = Map::new();
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(filename) => {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(bad_request)?;
                files.push(json!({
                    "field": name,
                    "filename": filename,
                    "content_type": content_type,
                    "size": bytes.len(),
                }));
            }
            None => {
                let text = field.text().await.map_err(bad_request)?;
                fields.insert(name, Value::String(text));
            }
        }
    }
    Ok(Json(json!({ "fields": fields, "files": files })))
}
