//! In-process mock of the attendance backend
//!
//! Binds an axum router on an ephemeral port and records every request it
//! sees, so tests can assert on exactly which calls the client made.

#![allow(dead_code)]

use axum::body::Bytes;
use axum::extract::{Path, Query, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hajiri_client::ApiClient;
use hajiri_common::api::auth::{StaticToken, TokenProvider};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const GOOD_PASSWORD: &str = "Correct@123";
pub const UNKNOWN_ROLL: &str = "999";

/// One request as the backend saw it
#[derive(Debug, Clone)]
pub struct Seen {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
}

#[derive(Default)]
pub struct MockState {
    pub seen: Mutex<Vec<Seen>>,
    pub bodies: Mutex<HashMap<String, Vec<Value>>>,
    pub raw_bodies: Mutex<Vec<(String, Option<String>, Bytes)>>,
    pub open_session: Mutex<Option<i64>>,
    pub next_session_id: AtomicI64,
    /// Create calls that fail with a 500 before one succeeds
    pub create_failures: AtomicUsize,
    /// Delay applied to open-session lookups
    pub lookup_delay_ms: AtomicU64,
    /// Recognition calls that fail with a 500 before one succeeds
    pub recognize_failures: AtomicUsize,
    pub recognized: Mutex<Value>,
    pub users: Mutex<Value>,
}

impl MockState {
    /// Requests matching `method` and `path`
    pub fn hits(&self, method: &str, path: &str) -> usize {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.method == method && s.path == path)
            .count()
    }

    pub fn total_hits(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn bodies(&self, path: &str) -> Vec<Value> {
        self.bodies
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    fn record_body(&self, path: &str, body: Value) {
        self.bodies
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push(body);
    }
}

pub struct MockBackend {
    pub base_url: String,
    pub state: Arc<MockState>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = Arc::new(MockState {
            next_session_id: AtomicI64::new(41),
            recognized: Mutex::new(json!([])),
            users: Mutex::new(default_users()),
            ..Default::default()
        });

        let app = Router::new()
            .route("/api/token/", post(token))
            .route("/api/attendance/session/open/", get(open_session))
            .route("/api/attendance/session/create/", post(create_session))
            .route("/api/attendance/recognize/", post(recognize))
            .route("/api/attendance/manual/", post(manual_mark))
            .route("/accounts/api/users/", get(list_users).post(register))
            .route(
                "/accounts/api/users/:id/",
                get(get_user)
                    .put(update_user)
                    .patch(update_registration)
                    .delete(no_content),
            )
            .route("/academics/api/classes/", get(list_classes).post(create_class))
            .route("/academics/api/classes/:id/", put(update_record).delete(no_content))
            .route("/academics/api/subjects/", get(list_subjects))
            .route("/academics/api/subjects/:id/", put(update_record).delete(no_content))
            .route("/academics/api/class-subject/", get(list_assignments))
            .route("/academics/api/class-subject/:id/", delete(no_content))
            .route("/academics/api/student-class-enrollment/", get(list_enrollments).post(echo))
            .route("/api/admin/assign-teacher/", post(echo))
            .route("/api/admin/approve-user/", post(echo))
            .route("/api/admin/send-feedback/", post(echo))
            .route("/api/teacher/student-records/", get(student_records))
            .layer(middleware::from_fn_with_state(state.clone(), record_request))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub fn client(&self) -> Arc<ApiClient> {
        self.client_with(Arc::new(StaticToken::new("test-token")))
    }

    pub fn client_with(&self, tokens: Arc<dyn TokenProvider>) -> Arc<ApiClient> {
        Arc::new(ApiClient::with_timeout(&self.base_url, Duration::from_secs(5), tokens).unwrap())
    }
}

/// Unsigned JWT with the given payload
pub fn jwt(payload: Value) -> String {
    format!(
        "{}.{}.sig",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(payload.to_string())
    )
}

fn default_users() -> Value {
    json!([
        {"id": 1, "email": "admin@college.edu", "name": "Admin", "role": "admin", "approval_status": "approved"},
        {"id": 2, "email": "teacher@college.edu", "name": "Hari Teacher", "role": "teacher", "approval_status": "approved"},
        {"id": 3, "email": "sita@college.edu", "name": "Sita Sharma", "role": "student",
         "roll_number": 221506, "approval_status": "pending",
         "attendance": [
            {"date": "2024-05-01", "subject": "Database", "subject_code": "CS201", "entry_status": "present"},
            {"date": "2024-05-02", "subject": "Database", "subject_code": "CS201", "entry_status": "absent"}
         ]},
        {"id": 4, "email": "ram@college.edu", "name": "Ram Thapa", "role": "student",
         "roll_number": "221507", "approval_status": "unapproved"}
    ])
}

async fn record_request(State(state): State<Arc<MockState>>, req: Request, next: Next) -> Response {
    let seen = Seen {
        method: req.method().to_string(),
        path: req.uri().path().to_string(),
        query: req.uri().query().map(str::to_string),
        authorization: req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };
    state.seen.lock().unwrap().push(seen);
    next.run(req).await
}

async fn token(Json(body): Json<Value>) -> Response {
    if body["password"] != GOOD_PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "No active account found with the given credentials"})),
        )
            .into_response();
    }

    let role = match body["email"].as_str() {
        Some(e) if e.starts_with("admin") => "admin",
        Some(e) if e.starts_with("teacher") => "teacher",
        _ => "student",
    };
    let access = jwt(json!({"email": body["email"], "role": role, "user_id": 1}));
    Json(json!({"access": access, "refresh": "refresh-token"})).into_response()
}

async fn open_session(
    State(state): State<Arc<MockState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let delay = state.lookup_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    if !params.contains_key("class_subject_id") {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "class_subject_id required"})))
            .into_response();
    }

    let open = *state.open_session.lock().unwrap();
    match open {
        Some(id) => Json(json!({"session_id": id})).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"detail": "No open session"}))).into_response(),
    }
}

async fn create_session(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.record_body("/api/attendance/session/create/", body);

    let failing = state
        .create_failures
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if failing {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Database unavailable"})),
        )
            .into_response();
    }

    let id = state.next_session_id.fetch_add(1, Ordering::SeqCst);
    *state.open_session.lock().unwrap() = Some(id);
    Json(json!({"session_id": id})).into_response()
}

async fn recognize(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.record_body("/api/attendance/recognize/", body);

    let failing = state
        .recognize_failures
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if failing {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Recognition service unavailable"})),
        )
            .into_response();
    }

    let recognized = state.recognized.lock().unwrap().clone();
    Json(json!({"recognized": recognized})).into_response()
}

async fn manual_mark(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.record_body("/api/attendance/manual/", body.clone());

    if body["roll_number"] == UNKNOWN_ROLL {
        return Json(json!({"success": false, "message": "", "error": "Student not found"}))
            .into_response();
    }
    Json(json!({
        "success": true,
        "message": format!("Marked {} ({})", body["roll_number"].as_str().unwrap_or(""), body["mode"].as_str().unwrap_or(""))
    }))
    .into_response()
}

async fn list_users(
    State(state): State<Arc<MockState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let users = state.users.lock().unwrap().clone();
    let filtered: Vec<Value> = users
        .as_array()
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .filter(|u| params.get("role").map_or(true, |r| u["role"] == r.as_str()))
        .collect();
    // Paginated envelope, unlike the academics lists
    Json(json!({"count": filtered.len(), "results": filtered})).into_response()
}

async fn register(State(state): State<Arc<MockState>>, headers: HeaderMap, body: Bytes) -> Response {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |ct| ct.starts_with("application/json"));
    if !is_json {
        return registration_response(&state, "POST", headers, body, 10);
    }

    // Admin-created user
    let payload: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    state.record_body("/accounts/api/users/", payload.clone());
    let mut created = payload;
    if let Some(fields) = created.as_object_mut() {
        fields.remove("password");
        fields.insert("id".to_string(), json!(5));
        fields.insert("approval_status".to_string(), json!("approved"));
    }
    (StatusCode::CREATED, Json(created)).into_response()
}

async fn get_user(State(state): State<Arc<MockState>>, Path(id): Path<i64>) -> Response {
    let users = state.users.lock().unwrap().clone();
    let found = users
        .as_array()
        .and_then(|all| all.iter().find(|u| u["id"] == id).cloned());
    match found {
        Some(user) => Json(user).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response(),
    }
}

async fn update_user(
    State(state): State<Arc<MockState>>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    state.record_body(&format!("/accounts/api/users/{}/", id), body.clone());
    let mut updated = body;
    if let Some(fields) = updated.as_object_mut() {
        fields.remove("password");
        fields.insert("id".to_string(), json!(id));
    }
    Json(updated).into_response()
}

async fn update_registration(
    State(state): State<Arc<MockState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    registration_response(&state, "PATCH", headers, body, id)
}

fn registration_response(state: &MockState, method: &str, headers: HeaderMap, body: Bytes, id: i64) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state
        .raw_bodies
        .lock()
        .unwrap()
        .push((method.to_string(), content_type, body));

    (
        StatusCode::CREATED,
        Json(json!({"id": id, "email": "new@college.edu", "name": "New Student", "role": "student", "approval_status": "pending"})),
    )
        .into_response()
}

async fn list_classes() -> Json<Value> {
    Json(json!([
        {"id": 1, "name": "BCA 1st", "year": 2024, "semester": 1, "department": "Computer"},
        {"id": 2, "name": "BCA 3rd", "year": 2023, "semester": 3, "department": "Computer"}
    ]))
}

async fn create_class(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.record_body("/academics/api/classes/", body.clone());
    let mut created = body;
    created["id"] = json!(3);
    (StatusCode::CREATED, Json(created)).into_response()
}

async fn update_record(State(state): State<Arc<MockState>>, Path(id): Path<i64>, req: Request) -> Response {
    let path = req.uri().path().to_string();
    let bytes = axum::body::to_bytes(req.into_body(), usize::MAX)
        .await
        .unwrap_or_default();
    let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    state.record_body(&path, body.clone());
    let mut updated = body;
    updated["id"] = json!(id);
    Json(updated).into_response()
}

async fn list_subjects() -> Json<Value> {
    Json(json!([{"id": 1, "name": "Database", "code": "CS201"}]))
}

async fn list_assignments() -> Json<Value> {
    Json(json!([{"id": 7, "class_instance": 1, "subject": 1, "teacher": 2}]))
}

async fn list_enrollments() -> Json<Value> {
    Json(json!([
        {"id": 1, "student": 3, "enrolled_class": 1},
        {"id": 2, "student": 4, "enrolled_class": 1}
    ]))
}

async fn student_records() -> Json<Value> {
    Json(json!([
        {"student_id": 3, "name": "Sita Sharma", "roll_number": "221506", "attendance": [
            {"date": "2024-05-01", "subject": "Database", "subject_code": "CS201", "entry_status": "present"},
            {"date": "2024-05-02", "subject": "Database", "subject_code": "CS201", "entry_status": "manual-present"},
            {"date": "2024-05-03", "subject": "Database", "subject_code": "CS201", "entry_status": "absent"}
        ]},
        {"student_id": 4, "name": "Ram Thapa", "roll_number": 221507, "attendance": []}
    ]))
}

async fn echo(State(state): State<Arc<MockState>>, req: Request) -> Response {
    let path = req.uri().path().to_string();
    let bytes = axum::body::to_bytes(req.into_body(), usize::MAX)
        .await
        .unwrap_or_default();
    let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    state.record_body(&path, body);
    (StatusCode::CREATED, Json(json!({"message": "ok"}))).into_response()
}

async fn no_content() -> StatusCode {
    StatusCode::NO_CONTENT
}
