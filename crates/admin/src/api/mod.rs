//! Authenticated client for the CMS backend.
//!
//! # Architecture
//!
//! - [`ApiClient`] - request pipeline: bearer attachment, 401 detection,
//!   single-flight refresh, replay and forced logout
//! - [`RefreshCoordinator`] - the single-flight primitive
//! - [`AuthService`] - login, signup, refresh, logout and current user
//! - [`ResourceClient`] - cached CRUD over the CMS content types

pub mod auth;
pub mod client;
pub mod refresh;
pub mod request;
pub mod resources;
pub mod wire;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

pub use auth::AuthService;
pub use client::ApiClient;
pub use refresh::{PendingRefresh, RefreshCoordinator, RefreshError, RefreshLease, RefreshTicket};
pub use request::ApiRequest;
pub use resources::{ResourceClient, ResourceError, ResourceKind, ResourceList};
pub use wire::{Pagination, PresignedUpload};

/// Backend endpoint paths.
pub mod endpoints {
    pub const LOGIN: &str = "/v1/auth/login";
    pub const REGISTER: &str = "/v1/auth/register";
    pub const REFRESH: &str = "/v1/auth/refresh";
    pub const LOGOUT: &str = "/v1/auth/logout";
    pub const ME: &str = "/v1/auth/me";
    pub const ADMIN_PREFIX: &str = "/v1/admin";
    pub const UPLOAD_URL: &str = "/v1/admin/upload-url";

    /// Path fragments whose 401 must not trigger a refresh.
    pub const NO_REFRESH_SUFFIXES: [&str; 3] = ["/auth/login", "/auth/register", "/auth/refresh"];
}

/// Errors from talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("API error ({status}): {message}")]
    Status { status: StatusCode, message: String },

    #[error("Session expired: {0}")]
    SessionExpired(#[source] RefreshError),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// HTTP status reported by the backend, if the request got that far.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED),
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status(),
            _ => None,
        }
    }

    /// The session is gone and the user has to sign in again.
    #[must_use]
    pub const fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired(_))
    }

    /// The caller must sign in again: the session is gone, or even a fresh
    /// token was rejected.
    #[must_use]
    pub const fn needs_login(&self) -> bool {
        matches!(self, Self::SessionExpired(_) | Self::Unauthorized { .. })
    }

    /// Message suitable for showing to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthorized { message } | Self::Status { message, .. } => message.clone(),
            Self::SessionExpired(_) => "Please login again to continue.".to_string(),
            Self::Http(e) if e.is_timeout() => "The server took too long to respond.".to_string(),
            Self::Http(_) => "Could not reach the server.".to_string(),
            Self::Parse(_) | Self::Url(_) => "Unexpected response from the server.".to_string(),
        }
    }
}

/// A successful backend response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiResponse {
    /// Turn a raw response into a success value or an error.
    ///
    /// Empty bodies become `Value::Null`; non-JSON success bodies are kept as
    /// a string.
    async fn from_response(response: reqwest::Response) -> Result<Self, ApiError> {
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            let body = if text.trim().is_empty() {
                Value::Null
            } else {
                serde_json::from_str(&text).unwrap_or(Value::String(text))
            };
            return Ok(Self { status, body });
        }

        let message = error_message(status, &text);
        if status == StatusCode::UNAUTHORIZED {
            Err(ApiError::Unauthorized { message })
        } else {
            Err(ApiError::Status { status, message })
        }
    }

    /// Deserialize the body.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Parse` if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        Ok(serde_json::from_value(self.body)?)
    }
}

/// Message from an error body, falling back to the status reason.
pub(crate) fn error_message(status: StatusCode, text: &str) -> String {
    wire::ErrorBody::message_from(text).unwrap_or_else(|| {
        status
            .canonical_reason()
            .map_or_else(|| format!("HTTP {}", status.as_u16()), str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_fallback() {
        assert_eq!(
            error_message(StatusCode::CONFLICT, r#"{"message":"Email already registered"}"#),
            "Email already registered"
        );
        assert_eq!(error_message(StatusCode::NOT_FOUND, ""), "Not Found");
    }

    #[test]
    fn test_api_error_status() {
        let err = ApiError::Unauthorized {
            message: "nope".to_string(),
        };
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(err.to_string(), "Unauthorized: nope");

        let err = ApiError::SessionExpired(RefreshError::MissingRefreshToken);
        assert!(err.status().is_none());
        assert!(err.is_session_expired());
        assert_eq!(err.user_message(), "Please login again to continue.");
    }
}
