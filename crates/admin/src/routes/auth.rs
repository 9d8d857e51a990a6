//! Login, signup and logout handlers.

use askama::Template;
use axum::{
    Form,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;

use folio_core::{FormErrors, LoginForm, RegisterForm};

use super::views::{NoticeView, render, take_notices};
use crate::api::ApiError;
use crate::error::clear_sentry_user;
use crate::notify::Notice;
use crate::paths;
use crate::session::CredentialGrant;
use crate::session::cookies::read_request_cookies;
use crate::state::AppState;

/// Login / signup page template.
#[derive(Template)]
#[template(path = "auth.html")]
pub struct AuthTemplate {
    pub notices: Vec<NoticeView>,
    pub register: bool,
    pub name: String,
    pub email: String,
    pub errors: FormErrors,
    pub message: Option<String>,
}

impl AuthTemplate {
    fn new(state: &AppState, register: bool) -> Self {
        Self {
            notices: take_notices(state),
            register,
            name: String::new(),
            email: String::new(),
            errors: FormErrors::default(),
            message: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthQuery {
    #[serde(default)]
    pub mode: Option<String>,
}

/// GET /auth
pub async fn page(State(state): State<AppState>, Query(query): Query<AuthQuery>) -> Response {
    let register = query.mode.as_deref() == Some("register");
    respond(StatusCode::OK, &AuthTemplate::new(&state, register))
}

/// POST /auth/login
#[instrument(skip(state, form))]
pub async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    let valid = match form.validate() {
        Ok(valid) => valid,
        Err(errors) => {
            let template = AuthTemplate {
                email: form.email,
                errors,
                ..AuthTemplate::new(&state, false)
            };
            return respond(StatusCode::UNPROCESSABLE_ENTITY, &template);
        }
    };

    match state.auth().login(&valid).await {
        Ok(user) => {
            state.resources().invalidate_all();
            state.notices().push(
                Notice::success("Login successful")
                    .with_description(format!("Welcome back, {}.", user.name)),
            );
            let mut response = Redirect::to(paths::DASHBOARD).into_response();
            response.extensions_mut().insert(CredentialGrant);
            response
        }
        Err(e) => {
            tracing::warn!(error = %e, "Login failed");
            let (status, message) = login_failure(&e);
            let template = AuthTemplate {
                email: form.email,
                message: Some(message),
                ..AuthTemplate::new(&state, false)
            };
            respond(status, &template)
        }
    }
}

/// POST /auth/register
#[instrument(skip(state, form))]
pub async fn register(State(state): State<AppState>, Form(form): Form<RegisterForm>) -> Response {
    let valid = match form.validate() {
        Ok(valid) => valid,
        Err(errors) => {
            let template = AuthTemplate {
                name: form.name,
                email: form.email,
                errors,
                ..AuthTemplate::new(&state, true)
            };
            return respond(StatusCode::UNPROCESSABLE_ENTITY, &template);
        }
    };

    match state.auth().register(&valid).await {
        Ok(()) => {
            state.notices().push(
                Notice::success("Registration successful")
                    .with_description("Please sign in with your new account."),
            );
            Redirect::to(paths::LOGIN).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Registration failed");
            let (status, message) = register_failure(&e);
            let template = AuthTemplate {
                name: form.name,
                email: form.email,
                message: Some(message),
                ..AuthTemplate::new(&state, true)
            };
            respond(status, &template)
        }
    }
}

/// POST /dashboard/logout
///
/// Only the browser holding the session can end it; any other browser just
/// has its cookies cleared on the way to `/auth`.
#[instrument(skip(state, headers))]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Redirect {
    if !state
        .cookie_mirror()
        .recognizes(&read_request_cookies(&headers))
    {
        tracing::warn!("Logout from a browser that does not hold the session");
        return Redirect::to(paths::LOGIN);
    }
    state.auth().logout().await;
    state.resources().invalidate_all();
    clear_sentry_user();
    state
        .notices()
        .push(Notice::success("Logged out").with_description("See you again!"));
    Redirect::to(paths::LOGIN)
}

fn respond(status: StatusCode, template: &AuthTemplate) -> Response {
    match render(template) {
        Ok(html) => (status, html).into_response(),
        Err(e) => e.into_response(),
    }
}

fn login_failure(e: &ApiError) -> (StatusCode, String) {
    match e.status() {
        Some(StatusCode::UNAUTHORIZED) => (
            StatusCode::UNAUTHORIZED,
            "Invalid email or password.".to_string(),
        ),
        Some(StatusCode::NOT_FOUND) => (StatusCode::NOT_FOUND, "Account not found.".to_string()),
        Some(StatusCode::TOO_MANY_REQUESTS) => (
            StatusCode::TOO_MANY_REQUESTS,
            "Too many attempts. Please try again later.".to_string(),
        ),
        _ => (StatusCode::BAD_GATEWAY, e.user_message()),
    }
}

fn register_failure(e: &ApiError) -> (StatusCode, String) {
    match e.status() {
        Some(StatusCode::CONFLICT) => (
            StatusCode::CONFLICT,
            "Email is already registered.".to_string(),
        ),
        Some(status) if status.is_client_error() => (StatusCode::UNPROCESSABLE_ENTITY, e.user_message()),
        _ => (StatusCode::BAD_GATEWAY, e.user_message()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RefreshError;

    #[test]
    fn test_login_failure_messages() {
        let (status, message) = login_failure(&ApiError::Unauthorized {
            message: "bad".to_string(),
        });
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(message, "Invalid email or password.");

        let (status, _) = login_failure(&ApiError::SessionExpired(RefreshError::Abandoned));
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_register_failure_messages() {
        let (status, message) = register_failure(&ApiError::Status {
            status: StatusCode::CONFLICT,
            message: "exists".to_string(),
        });
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(message, "Email is already registered.");

        let (status, message) = register_failure(&ApiError::Status {
            status: StatusCode::BAD_REQUEST,
            message: "Name too short".to_string(),
        });
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(message, "Name too short");
    }
}
