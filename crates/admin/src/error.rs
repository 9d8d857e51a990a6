//! Unified error handling for the dashboard.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;

use crate::api::{ApiError, ResourceError};
use crate::paths;

/// Application-level error type for dashboard handlers.
#[derive(Debug, Error)]
pub enum AppError {
    /// Backend call failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Template rendering or other internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ResourceError> for AppError {
    fn from(err: ResourceError) -> Self {
        match err {
            ResourceError::UnknownKind(slug) => Self::NotFound(slug),
            ResourceError::Unsupported { .. } | ResourceError::InvalidId(_) => {
                Self::BadRequest(err.to_string())
            }
            ResourceError::Api(api) => Self::Api(api),
        }
    }
}

impl From<askama::Error> for AppError {
    fn from(err: askama::Error) -> Self {
        Self::Internal(format!("template rendering failed: {err}"))
    }
}

impl AppError {
    /// The session cannot be used any more; the user has to sign in.
    const fn needs_login(&self) -> bool {
        matches!(self, Self::Api(api) if api.needs_login())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.needs_login() {
            tracing::info!(error = %self, "Session unusable, redirecting to login");
            return Redirect::to(paths::LOGIN).into_response();
        }

        // Log server errors with Sentry
        if matches!(self, Self::Internal(_) | Self::Api(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Dashboard request error"
            );
        }

        let status = match &self {
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Api(ApiError::Status { status, .. }) if *status == StatusCode::NOT_FOUND => {
                StatusCode::NOT_FOUND
            }
            Self::Api(_) => StatusCode::BAD_GATEWAY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Internal(_) => "Internal server error".to_string(),
            Self::Api(api) => api.user_message(),
            _ => self.to_string(),
        };

        (status, message).into_response()
    }
}

/// Set the Sentry user context from the signed-in user.
pub fn set_sentry_user(user_id: &str, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}
