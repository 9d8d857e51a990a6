//! HTTP route handlers for the dashboard.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                                  - Health check
//! GET  /                                        - Public landing page
//!
//! # Auth
//! GET  /auth[?mode=register]                    - Login / signup page
//! POST /auth/login                              - Sign in
//! POST /auth/register                           - Create account
//! POST /dashboard/logout                        - Sign out
//!
//! # Dashboard (privileged role required)
//! GET  /dashboard                               - Overview with counts
//! GET  /dashboard/{resource}[?page=&limit=]     - List
//! POST /dashboard/{resource}                    - Create
//! POST /dashboard/{resource}/{id}               - Update
//! POST /dashboard/{resource}/{id}/{action}      - delete | read | activate
//! ```

pub mod auth;
pub mod dashboard;
pub mod public;
pub mod resources;
pub mod views;

use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};

use crate::middleware::{
    edge_filter, pending_navigation, request_id, require_admin, security_headers, sync_cookies,
};
use crate::state::AppState;

/// Routes behind the route guard.
fn dashboard_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard::overview))
        .route(
            "/dashboard/{resource}",
            get(resources::index).post(resources::create),
        )
        .route("/dashboard/{resource}/{id}", post(resources::update))
        .route(
            "/dashboard/{resource}/{id}/{action}",
            post(resources::action),
        )
        .route_layer(from_fn_with_state(state.clone(), require_admin))
}

/// Build the full application router with its middleware stack.
///
/// Tracing and Sentry layers are added by the binary.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/", get(public::home))
        .route("/auth", get(auth::page))
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register))
        .route("/dashboard/logout", post(auth::logout))
        .merge(dashboard_routes(&state))
        .layer(from_fn(edge_filter))
        .layer(from_fn_with_state(
            state.navigator().clone(),
            pending_navigation,
        ))
        .layer(from_fn_with_state(state.cookie_mirror(), sync_cookies))
        .layer(from_fn(security_headers))
        .layer(from_fn(request_id))
        .with_state(state)
}

/// Liveness health check endpoint.
async fn health() -> &'static str {
    "ok"
}
