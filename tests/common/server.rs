//! Fake REST backend for the HTTP collaborators.
//!
//! Speaks the auth and event endpoints under `/api`, answers events the
//! way a document store would (`_id`, ISO timestamps for dates) and
//! rejects unknown bearer tokens with 401.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use kalenteri::components::event_remote::{Event, EventDraft};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// Everything the fake backend knows, shared with the test
#[derive(Default)]
pub struct BackendState {
    /// email -> (password, user id)
    accounts: Mutex<HashMap<String, (String, String)>>,
    /// token -> email
    tokens: Mutex<HashMap<String, String>>,
    events: Mutex<Vec<Event>>,
    next_id: AtomicU64,
    /// (month, year) of every month query received
    month_queries: Mutex<Vec<(String, String)>>,
}

impl BackendState {
    /// Create an account and a session for it, returning the token
    pub fn add_user(&self, email: &str, password: &str) -> String {
        let id = format!("u{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.accounts
            .lock()
            .unwrap()
            .insert(email.to_string(), (password.to_string(), id));
        self.issue_token(email)
    }

    /// Forget every issued token, as if they all expired
    pub fn expire_sessions(&self) {
        self.tokens.lock().unwrap().clear();
    }

    pub fn insert_event(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn month_queries(&self) -> Vec<(String, String)> {
        self.month_queries.lock().unwrap().clone()
    }

    fn issue_token(&self, email: &str) -> String {
        let token = format!("tok-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.tokens
            .lock()
            .unwrap()
            .insert(token.clone(), email.to_string());
        token
    }

    fn user_json(&self, email: &str) -> Value {
        let accounts = self.accounts.lock().unwrap();
        let id = accounts.get(email).map(|(_, id)| id.clone()).unwrap_or_default();
        json!({ "_id": id, "email": email })
    }

    /// Email of the bearer, if the token is known
    fn bearer(&self, headers: &HeaderMap) -> Option<String> {
        let header = headers.get("authorization")?.to_str().ok()?;
        let token = header.strip_prefix("Bearer ")?;
        self.tokens.lock().unwrap().get(token).cloned()
    }
}

/// Events leave the backend with `_id` and a full timestamp
fn event_json(event: &Event) -> Value {
    json!({
        "_id": event.id,
        "title": event.title,
        "date": format!("{}T00:00:00.000Z", event.date),
        "time": event.time,
        "endTime": event.end_time,
        "description": event.description,
    })
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

fn unauthorized() -> Response {
    error(StatusCode::UNAUTHORIZED, "Token is not valid")
}

#[derive(Deserialize)]
struct Credentials {
    email: String,
    password: String,
}

async fn signup(State(state): State<Arc<BackendState>>, Json(body): Json<Credentials>) -> Response {
    if state.accounts.lock().unwrap().contains_key(&body.email) {
        return error(StatusCode::BAD_REQUEST, "User already exists");
    }
    let token = state.add_user(&body.email, &body.password);
    (
        StatusCode::CREATED,
        Json(json!({ "user": state.user_json(&body.email), "token": token })),
    )
        .into_response()
}

async fn login(State(state): State<Arc<BackendState>>, Json(body): Json<Credentials>) -> Response {
    let matches = state
        .accounts
        .lock()
        .unwrap()
        .get(&body.email)
        .is_some_and(|(password, _)| *password == body.password);
    if !matches {
        return error(StatusCode::BAD_REQUEST, "Invalid credentials");
    }
    let token = state.issue_token(&body.email);
    Json(json!({ "user": state.user_json(&body.email), "token": token })).into_response()
}

async fn verify_token(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    match state.bearer(&headers) {
        Some(email) => Json(json!({ "user": state.user_json(&email) })).into_response(),
        None => unauthorized(),
    }
}

async fn month_events(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if state.bearer(&headers).is_none() {
        return unauthorized();
    }

    let month = query.get("month").cloned().unwrap_or_default();
    let year = query.get("year").cloned().unwrap_or_default();
    state
        .month_queries
        .lock()
        .unwrap()
        .push((month.clone(), year.clone()));

    let (Ok(month), Ok(year)) = (month.parse::<u32>(), year.parse::<i32>()) else {
        return error(StatusCode::BAD_REQUEST, "month and year are required");
    };

    let events: Vec<Value> = state
        .events()
        .iter()
        .filter(|e| {
            use chrono::Datelike;
            e.date.month() == month && e.date.year() == year
        })
        .map(event_json)
        .collect();
    Json(events).into_response()
}

async fn all_events(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    if state.bearer(&headers).is_none() {
        return unauthorized();
    }
    let events: Vec<Value> = state.events().iter().map(event_json).collect();
    Json(events).into_response()
}

async fn create_event(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Json(draft): Json<EventDraft>,
) -> Response {
    if state.bearer(&headers).is_none() {
        return unauthorized();
    }
    let id = (state.next_id.fetch_add(1, Ordering::SeqCst) + 100).to_string();
    let event = Event::from_draft(id, draft);
    state.insert_event(event.clone());
    (StatusCode::CREATED, Json(event_json(&event))).into_response()
}

async fn get_event(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if state.bearer(&headers).is_none() {
        return unauthorized();
    }
    match state.events().iter().find(|e| e.id == id) {
        Some(event) => Json(event_json(event)).into_response(),
        None => error(StatusCode::NOT_FOUND, "Event not found"),
    }
}

async fn update_event(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(mut event): Json<Event>,
) -> Response {
    if state.bearer(&headers).is_none() {
        return unauthorized();
    }
    event.id = id;
    let mut events = state.events.lock().unwrap();
    match events.iter_mut().find(|e| e.id == event.id) {
        Some(slot) => {
            *slot = event.clone();
            Json(event_json(&event)).into_response()
        }
        None => error(StatusCode::NOT_FOUND, "Event not found"),
    }
}

async fn delete_event(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if state.bearer(&headers).is_none() {
        return unauthorized();
    }
    let mut events = state.events.lock().unwrap();
    let before = events.len();
    events.retain(|e| e.id != id);
    if events.len() == before {
        return error(StatusCode::NOT_FOUND, "Event not found");
    }
    StatusCode::NO_CONTENT.into_response()
}

fn make_app(state: Arc<BackendState>) -> Router {
    Router::new()
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/login", post(login))
        .route("/api/auth/verify-token", post(verify_token))
        .route("/api/events/month", get(month_events))
        .route("/api/events", get(all_events).post(create_event))
        .route(
            "/api/events/{id}",
            get(get_event).put(update_event).delete(delete_event),
        )
        .with_state(state)
}

/// Fake backend on a random local port, stopped when dropped
pub struct TestServer {
    /// Base URL of the API, e.g. "http://127.0.0.1:12345/api/"
    pub api_url: String,
    pub state: Arc<BackendState>,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let state = Arc::new(BackendState::default());

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let app = make_app(Arc::clone(&state));

        // The listener is bound, so requests queue until the server polls it
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        Self {
            api_url: format!("http://127.0.0.1:{}/api/", port),
            state,
            _shutdown_tx: Some(shutdown_tx),
        }
    }
}
