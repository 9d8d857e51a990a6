//! Authentication operations against the backend.

use secrecy::ExposeSecret;
use serde_json::json;
use tracing::instrument;

use folio_core::{TokenPair, UserRecord, ValidLogin, ValidRegistration};

use super::client::ApiClient;
use super::refresh::RefreshError;
use super::request::ApiRequest;
use super::wire::{Envelope, TokenPayload};
use super::{ApiError, endpoints};

/// Login, signup, refresh, logout and current-user lookups.
///
/// All calls go through the [`ApiClient`] pipeline and update the shared
/// session store.
#[derive(Debug, Clone)]
pub struct AuthService {
    api: ApiClient,
}

impl AuthService {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Sign in, store the credential pair, then fetch the user.
    ///
    /// # Errors
    ///
    /// `ApiError::Unauthorized` for bad credentials; any pipeline error from
    /// the follow-up user lookup (the credentials stay stored in that case).
    #[instrument(skip(self, login), fields(email = %login.email))]
    pub async fn login(&self, login: &ValidLogin) -> Result<UserRecord, ApiError> {
        let body = json!({
            "email": login.email.as_str(),
            "password": login.password.expose_secret(),
        });
        let payload: TokenPayload = self.api.json(ApiRequest::post(endpoints::LOGIN, body)).await?;

        self.api.session().login(payload.into(), None);
        tracing::info!("Signed in");

        self.current_user().await
    }

    /// Create an account. Does not sign in.
    ///
    /// # Errors
    ///
    /// `ApiError::Status` with 409 if the email is taken, or other pipeline
    /// errors.
    #[instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register(&self, registration: &ValidRegistration) -> Result<(), ApiError> {
        let body = json!({
            "name": registration.name,
            "email": registration.email.as_str(),
            "password": registration.password.expose_secret(),
        });
        self.api
            .send(ApiRequest::post(endpoints::REGISTER, body))
            .await?;
        tracing::info!("Account registered");
        Ok(())
    }

    /// Explicitly exchange the refresh token for a new pair.
    ///
    /// # Errors
    ///
    /// `ApiError::SessionExpired` if no refresh token is held, otherwise the
    /// backend's rejection.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<TokenPair, ApiError> {
        let refresh = self
            .api
            .session()
            .refresh_token()
            .ok_or(ApiError::SessionExpired(RefreshError::MissingRefreshToken))?;

        let body = json!({ "refreshToken": refresh.expose_secret() });
        let payload: TokenPayload = self
            .api
            .json(ApiRequest::post(endpoints::REFRESH, body))
            .await?;

        let pair: TokenPair = payload.into();
        self.api.session().set_tokens(pair.clone());
        Ok(pair)
    }

    /// Sign out. The backend call is best effort; local state is always
    /// cleared.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        if let Some(refresh) = self.api.session().refresh_token() {
            let body = json!({ "refresh_token": refresh.expose_secret() });
            if let Err(e) = self.api.send(ApiRequest::post(endpoints::LOGOUT, body)).await {
                tracing::warn!(error = %e, "Backend logout failed, clearing local session anyway");
            }
        }

        self.api.session().logout();
        tracing::info!("Signed out");
    }

    /// Fetch the authenticated user and store it in the session.
    ///
    /// # Errors
    ///
    /// Any pipeline error, including `ApiError::SessionExpired`.
    #[instrument(skip(self))]
    pub async fn current_user(&self) -> Result<UserRecord, ApiError> {
        let envelope: Envelope<UserRecord> = self.api.json(ApiRequest::get(endpoints::ME)).await?;
        self.api.session().set_user(envelope.data.clone());
        Ok(envelope.data)
    }
}
