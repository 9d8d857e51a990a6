//! Integration test support for the Folio admin dashboard.
//!
//! [`FakeBackend`] is an in-process stand-in for the CMS REST API, bound to
//! an ephemeral loopback port. Tests control token validity, refresh
//! behaviour and seeded content, and inspect what the dashboard sent.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p folio-integration-tests
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    body::Bytes,
    http::{HeaderMap, StatusCode, header::{AUTHORIZATION, CONTENT_TYPE}},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use url::Url;

use folio_admin::config::FolioConfig;
use folio_admin::session::{MemoryStorage, SessionStorage};
use folio_admin::state::AppState;
use folio_core::TokenPair;

/// Password the fake backend accepts for every account.
pub const PASSWORD: &str = "correct-horse";

/// Email the fake backend reports as already registered.
pub const TAKEN_EMAIL: &str = "taken@example.com";

#[derive(Debug, Default)]
struct Backend {
    minted: u32,
    valid_access: HashSet<String>,
    valid_refresh: HashSet<String>,
    refresh_calls: usize,
    refresh_delay: Duration,
    refresh_failure: Option<StatusCode>,
    reject_all: bool,
    seen: Vec<Option<String>>,
    role: Option<String>,
    items: HashMap<String, Vec<Value>>,
    list_calls: usize,
    base_url: String,
    uploads: Vec<StoredUpload>,
}

/// An object `PUT` to the fake storage endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    pub key: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
    /// Whether the upload carried an `Authorization` header.
    pub had_authorization: bool,
}

impl Backend {
    fn mint(&mut self) -> (String, String) {
        self.minted += 1;
        let access = format!("access-{}", self.minted);
        let refresh = format!("refresh-{}", self.minted);
        self.valid_access.insert(access.clone());
        self.valid_refresh.insert(refresh.clone());
        (access, refresh)
    }
}

type Shared = Arc<Mutex<Backend>>;

/// Fake CMS backend running on `127.0.0.1:<ephemeral>`.
#[derive(Debug, Clone)]
pub struct FakeBackend {
    url: Url,
    state: Shared,
}

impl FakeBackend {
    /// Start the backend. Users get the `ADMIN` role unless changed.
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(Backend {
            role: Some("ADMIN".to_string()),
            ..Backend::default()
        }));

        let app = Router::new()
            .route("/v1/auth/login", post(login))
            .route("/v1/auth/register", post(register))
            .route("/v1/auth/refresh", post(refresh))
            .route("/v1/auth/logout", post(logout))
            .route("/v1/auth/me", get(me))
            .route("/v1/admin/upload-url", post(upload_url))
            .route("/storage/{*key}", put(store_object))
            .route("/v1/admin/{kind}", get(list).post(create))
            .route("/v1/admin/{kind}/{id}", get(fetch).put(update).delete(remove))
            .route("/v1/admin/{kind}/{id}/{action}", post(item_action).put(item_action))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake backend");
        let addr = listener.local_addr().expect("Fake backend has no address");

        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Fake backend stopped");
        });

        let url = Url::parse(&format!("http://{addr}")).expect("Invalid fake backend URL");
        state.lock().base_url = format!("http://{addr}");
        Self { url, state }
    }

    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Mint a valid token pair, as a prior login would have.
    #[must_use]
    pub fn issue_tokens(&self) -> TokenPair {
        let (access, refresh) = self.state.lock().mint();
        TokenPair::new(access, refresh)
    }

    /// Every access token issued so far stops working.
    pub fn expire_access_tokens(&self) {
        self.state.lock().valid_access.clear();
    }

    /// Delay refresh responses, so concurrent 401s overlap the refresh.
    pub fn set_refresh_delay(&self, delay: Duration) {
        self.state.lock().refresh_delay = delay;
    }

    /// Answer every refresh with `status`.
    pub fn fail_refresh_with(&self, status: StatusCode) {
        self.state.lock().refresh_failure = Some(status);
    }

    /// Reject every bearer token, even freshly minted ones.
    pub fn reject_all_tokens(&self) {
        self.state.lock().reject_all = true;
    }

    pub fn set_role(&self, role: Option<&str>) {
        self.state.lock().role = role.map(str::to_string);
    }

    /// Replace the items of one resource kind.
    pub fn seed(&self, kind: &str, items: Vec<Value>) {
        self.state.lock().items.insert(kind.to_string(), items);
    }

    #[must_use]
    pub fn refresh_calls(&self) -> usize {
        self.state.lock().refresh_calls
    }

    #[must_use]
    pub fn list_calls(&self) -> usize {
        self.state.lock().list_calls
    }

    /// Objects received by the fake storage endpoint, in arrival order.
    #[must_use]
    pub fn uploads(&self) -> Vec<StoredUpload> {
        self.state.lock().uploads.clone()
    }

    /// Bearer tokens seen on protected endpoints, in arrival order.
    #[must_use]
    pub fn seen_tokens(&self) -> Vec<Option<String>> {
        self.state.lock().seen.clone()
    }

    /// Dashboard state pointed at this backend, over in-memory storage.
    ///
    /// Not hydrated.
    #[must_use]
    pub fn admin_state(&self, storage: Arc<MemoryStorage>) -> AppState {
        let config = FolioConfig::with_api_base_url(self.url.clone());
        let storage: Arc<dyn SessionStorage> = storage;
        AppState::with_storage(config, storage).expect("Failed to build app state")
    }

    /// Hydrated dashboard state already holding a valid token pair.
    #[must_use]
    pub fn signed_in_state(&self) -> (AppState, TokenPair) {
        let state = self.admin_state(Arc::new(MemoryStorage::default()));
        state.session().hydrate();
        let pair = self.issue_tokens();
        state.session().login(pair.clone(), None);
        (state, pair)
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "success": false, "message": message })))
        .into_response()
}

/// Record the bearer token and check it.
fn authorize(state: &Shared, headers: &HeaderMap) -> Result<(), Response> {
    let token = bearer(headers);
    let mut backend = state.lock();
    backend.seen.push(token.clone());

    match token {
        Some(token) if !backend.reject_all && backend.valid_access.contains(&token) => Ok(()),
        Some(_) => Err(unauthorized("Token expired")),
        None => Err(unauthorized("Authentication required")),
    }
}

async fn login(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    if body["password"] != PASSWORD {
        return unauthorized("Invalid credentials");
    }
    let (access, refresh) = state.lock().mint();
    Json(json!({
        "success": true,
        "data": { "access_token": access, "refresh_token": refresh, "token_type": "Bearer" }
    }))
    .into_response()
}

async fn register(Json(body): Json<Value>) -> Response {
    if body["email"] == TAKEN_EMAIL {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "success": false, "message": "Email already exists" })),
        )
            .into_response();
    }
    (StatusCode::CREATED, Json(json!({ "success": true }))).into_response()
}

async fn refresh(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let delay = {
        let mut backend = state.lock();
        backend.refresh_calls += 1;
        backend.refresh_delay
    };
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let mut backend = state.lock();
    if let Some(status) = backend.refresh_failure {
        return (status, Json(json!({ "message": "Refresh token expired" }))).into_response();
    }

    let presented = body["refreshToken"].as_str().unwrap_or_default().to_string();
    if !backend.valid_refresh.remove(&presented) {
        return unauthorized("Invalid refresh token");
    }

    let (access, refresh) = backend.mint();
    Json(json!({ "accessToken": access, "refreshToken": refresh })).into_response()
}

async fn logout() -> Response {
    Json(json!({ "success": true })).into_response()
}

async fn me(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    let role = state.lock().role.clone();
    Json(json!({
        "success": true,
        "data": { "id": "u-1", "name": "Ada", "email": "ada@example.com", "role": role }
    }))
    .into_response()
}

async fn list(State(state): State<Shared>, Path(kind): Path<String>, headers: HeaderMap) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    let mut backend = state.lock();
    backend.list_calls += 1;
    let items = backend.items.get(&kind).cloned().unwrap_or_default();
    let total = items.len();
    Json(json!({
        "success": true,
        "data": items,
        "pagination": {
            "page": 1, "limit": 10, "total": total, "totalPages": 1,
            "hasNext": false, "hasPrev": false
        }
    }))
    .into_response()
}

async fn fetch(
    State(state): State<Shared>,
    Path((kind, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    let backend = state.lock();
    let found = backend
        .items
        .get(&kind)
        .and_then(|items| items.iter().find(|item| item["id"] == id.as_str()).cloned());
    match found {
        Some(item) => Json(json!({ "success": true, "data": item })).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({ "message": "Not found" }))).into_response(),
    }
}

async fn create(
    State(state): State<Shared>,
    Path(kind): Path<String>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    let mut backend = state.lock();
    let items = backend.items.entry(kind).or_default();
    body["id"] = json!(format!("new-{}", items.len() + 1));
    items.push(body.clone());
    (StatusCode::CREATED, Json(json!({ "success": true, "data": body }))).into_response()
}

async fn update(
    State(state): State<Shared>,
    Path((kind, id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    body["id"] = json!(id);
    let mut backend = state.lock();
    let items = backend.items.entry(kind).or_default();
    items.retain(|item| item["id"] != id.as_str());
    items.push(body.clone());
    Json(json!({ "success": true, "data": body })).into_response()
}

async fn remove(
    State(state): State<Shared>,
    Path((kind, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    if let Some(items) = state.lock().items.get_mut(&kind) {
        items.retain(|item| item["id"] != id.as_str());
    }
    Json(json!({ "success": true })).into_response()
}

async fn item_action(
    State(state): State<Shared>,
    Path((kind, id, action)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    let mut backend = state.lock();
    if let Some(item) = backend
        .items
        .get_mut(&kind)
        .and_then(|items| items.iter_mut().find(|item| item["id"] == id.as_str()))
    {
        match action.as_str() {
            "read" => item["isRead"] = json!(true),
            "activate" => item["isActive"] = json!(true),
            _ => {}
        }
    }
    Json(json!({ "success": true })).into_response()
}

async fn upload_url(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    let (Some(folder), Some(file_name)) = (body["folder"].as_str(), body["file_name"].as_str())
    else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "message": "Missing file name" })))
            .into_response();
    };
    let key = format!("{folder}/{file_name}");
    let base = state.lock().base_url.clone();
    Json(json!({
        "success": true,
        "data": {
            "upload_url": format!("{base}/storage/{key}?signature=fake"),
            "file_url": format!("https://cdn.example.com/{key}"),
            "key": key,
            "expires_in": 900
        }
    }))
    .into_response()
}

async fn store_object(
    State(state): State<Shared>,
    Path(key): Path<String>,
    headers: HeaderMap,
    bytes: Bytes,
) -> StatusCode {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.lock().uploads.push(StoredUpload {
        key,
        content_type,
        bytes: bytes.to_vec(),
        had_authorization: headers.contains_key(AUTHORIZATION),
    });
    StatusCode::OK
}
