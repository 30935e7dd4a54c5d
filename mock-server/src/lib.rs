//! In-memory fake of the tabular data service.
//!
//! Serves the shapes the client core must cope with: JSON arrays, JSON
//! objects, `{"error": ...}` objects returned with 200, bare text and empty
//! bodies. Every route requires the app token header and Basic credentials.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const APP_TOKEN: &str = "mock-app-token";
pub const USERNAME: &str = "publisher@example.org";
pub const PASSWORD: &str = "hunter2";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct View {
    pub id: String,
    pub name: String,
    pub owner: String,
}

/// One entry of a batch envelope, as the service receives it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchRequest {
    pub url: String,
    #[serde(rename = "requestType")]
    pub request_type: String,
    pub body: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchEnvelope {
    pub requests: Vec<BatchRequest>,
}

#[derive(Clone, Debug)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub app_token: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            username: USERNAME.to_string(),
            password: PASSWORD.to_string(),
            app_token: APP_TOKEN.to_string(),
        }
    }
}

impl Credentials {
    fn accepts(&self, headers: &HeaderMap) -> bool {
        let token = headers.get("x-app-token").and_then(|v| v.to_str().ok());
        if token != Some(self.app_token.as_str()) {
            return false;
        }
        let Some(encoded) = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Basic "))
        else {
            return false;
        };
        let expected = format!("{}:{}", self.username, self.password);
        STANDARD
            .decode(encoded)
            .map(|decoded| decoded == expected.as_bytes())
            .unwrap_or(false)
    }
}

#[derive(Debug, Default)]
pub struct ServiceState {
    pub credentials: Credentials,
    pub views: HashMap<String, View>,
    pub rows: HashMap<String, Vec<Value>>,
    /// Every envelope received on `/batches`, including rejected ones.
    pub batches: Vec<BatchEnvelope>,
    /// Number of upcoming batch posts to answer with an `error` object.
    pub failing_batches: usize,
}

impl ServiceState {
    /// Seeded with two views owned by user `demo`.
    pub fn seeded(credentials: Credentials) -> Self {
        let mut state = Self {
            credentials,
            ..Self::default()
        };
        for (id, name) in [("abcd-1234", "Crimes 2010"), ("wxyz-9876", "Building Permits")] {
            state.views.insert(
                id.to_string(),
                View {
                    id: id.to_string(),
                    name: name.to_string(),
                    owner: "demo".to_string(),
                },
            );
            state.rows.insert(id.to_string(), Vec::new());
        }
        state
    }

    pub fn fail_next_batches(&mut self, count: usize) {
        self.failing_batches = count;
    }

    fn apply(&mut self, request: &BatchRequest) -> Value {
        let Some(view_id) = request
            .url
            .strip_prefix("/views/")
            .and_then(|rest| rest.strip_suffix("/rows.json"))
        else {
            return json!({ "status": 404, "url": request.url });
        };
        if request.request_type != "POST" {
            return json!({ "status": 405, "url": request.url });
        }
        let Some(rows) = self.rows.get_mut(view_id) else {
            return json!({ "status": 404, "url": request.url });
        };
        match serde_json::from_str::<Value>(&request.body) {
            Ok(row) => {
                rows.push(with_row_id(row));
                json!({ "status": 200, "url": request.url })
            }
            Err(_) => json!({ "status": 400, "url": request.url }),
        }
    }
}

pub type Db = Arc<RwLock<ServiceState>>;

pub fn state() -> Db {
    Arc::new(RwLock::new(ServiceState::seeded(Credentials::default())))
}

pub fn app() -> Router {
    app_with(state())
}

pub fn app_with(db: Db) -> Router {
    Router::new()
        .route("/users/{user}/views.json", get(list_user_views))
        .route("/views/{id}", get(get_view))
        .route("/views/{id}/rows.json", get(list_rows).post(append_row))
        .route("/batches", post(submit_batch))
        .route("/notice", get(notice))
        .route("/empty", get(empty))
        .route("/status/{code}", get(status))
        .route_layer(middleware::from_fn_with_state(db.clone(), require_credentials))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with(listener: TcpListener, db: Db) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(db)).await
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn with_row_id(row: Value) -> Value {
    match row {
        Value::Object(mut map) => {
            map.insert(":id".to_string(), Value::String(Uuid::new_v4().to_string()));
            Value::Object(map)
        }
        other => other,
    }
}

async fn require_credentials(State(db): State<Db>, request: Request, next: Next) -> Response {
    let authorized = db.read().await.credentials.accepts(request.headers());
    if !authorized {
        tracing::debug!(uri = %request.uri(), "rejecting request without valid credentials");
        return error_body(StatusCode::UNAUTHORIZED, "authentication required");
    }
    next.run(request).await
}

async fn list_user_views(State(db): State<Db>, Path(user): Path<String>) -> Json<Vec<View>> {
    let state = db.read().await;
    let mut views: Vec<View> = state
        .views
        .values()
        .filter(|v| v.owner == user)
        .cloned()
        .collect();
    views.sort_by(|a, b| a.id.cmp(&b.id));
    Json(views)
}

/// `{id}` arrives with its `.json` suffix.
async fn get_view(State(db): State<Db>, Path(file): Path<String>) -> Response {
    let Some(id) = file.strip_suffix(".json") else {
        return error_body(StatusCode::NOT_FOUND, format!("no such resource: {file}"));
    };
    let state = db.read().await;
    match state.views.get(id) {
        Some(view) => Json(view.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "code": "not_found",
                "error": true,
                "message": format!("Cannot find view with id {id}"),
            })),
        )
            .into_response(),
    }
}

async fn list_rows(State(db): State<Db>, Path(id): Path<String>) -> Response {
    let state = db.read().await;
    match state.rows.get(&id) {
        Some(rows) => Json(rows.clone()).into_response(),
        None => error_body(StatusCode::NOT_FOUND, format!("no such view: {id}")),
    }
}

async fn append_row(
    State(db): State<Db>,
    Path(id): Path<String>,
    Json(row): Json<Value>,
) -> Response {
    let mut state = db.write().await;
    match state.rows.get_mut(&id) {
        Some(rows) => {
            let row = with_row_id(row);
            rows.push(row.clone());
            Json(row).into_response()
        }
        None => error_body(StatusCode::NOT_FOUND, format!("no such view: {id}")),
    }
}

/// Logical failures come back with status 200 and an `error` field.
async fn submit_batch(State(db): State<Db>, Json(envelope): Json<BatchEnvelope>) -> Response {
    let mut state = db.write().await;
    state.batches.push(envelope.clone());

    if state.failing_batches > 0 {
        state.failing_batches -= 1;
        tracing::info!(requests = envelope.requests.len(), "rejecting batch on request");
        return error_body(StatusCode::OK, "batch could not be applied, try again");
    }

    if let Some(bad) = envelope
        .requests
        .iter()
        .find(|r| !matches!(r.request_type.as_str(), "GET" | "POST" | "PUT" | "PATCH" | "DELETE"))
    {
        return error_body(
            StatusCode::OK,
            format!("unsupported requestType {}", bad.request_type),
        );
    }

    let results: Vec<Value> = envelope.requests.iter().map(|r| state.apply(r)).collect();
    tracing::info!(requests = results.len(), "applied batch");
    Json(results).into_response()
}

async fn notice() -> &'static str {
    "Scheduled maintenance in progress. Please try again later."
}

async fn empty() -> StatusCode {
    StatusCode::OK
}

async fn status(Path(code): Path<u16>) -> Response {
    match StatusCode::from_u16(code) {
        Ok(code) => (code, format!("status {code}")).into_response(),
        Err(_) => error_body(StatusCode::BAD_REQUEST, format!("invalid status {code}")),
    }
}
