//! The authenticated request pipeline.
//!
//! Every backend call goes through [`ApiClient::send`]:
//!
//! 1. Attach the current access token as a bearer credential.
//! 2. On a 401 from anything but login/register/refresh, recover:
//!    - if the token already rotated while the call was in flight, replay
//!      once with the current token;
//!    - otherwise join the single-flight refresh. The leader exchanges the
//!      refresh token, stores the new pair and releases the queue; followers
//!      replay with the leader's token.
//! 3. A failed refresh rejects every queued call, clears the session and
//!    hands off to the [`SessionExpiryHandler`].
//!
//! A replayed call is never recovered a second time.

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::instrument;
use url::Url;

use folio_core::TokenPair;

use super::refresh::{RefreshCoordinator, RefreshError, RefreshTicket};
use super::request::ApiRequest;
use super::wire::TokenPayload;
use super::{ApiError, ApiResponse, endpoints, error_message};
use crate::notify::SessionExpiryHandler;
use crate::session::SessionStore;

/// Shared backend client.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    http: reqwest::Client,
    base_url: String,
    session: SessionStore,
    refresh: RefreshCoordinator,
    on_expiry: Arc<dyn SessionExpiryHandler>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url)
            .field("refresh", &self.inner.refresh)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Build a client for the backend at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Http` if the HTTP client cannot be built.
    pub fn new(
        base_url: &Url,
        timeout: Duration,
        session: SessionStore,
        on_expiry: Arc<dyn SessionExpiryHandler>,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("folio-admin/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                http,
                base_url: base_url.as_str().trim_end_matches('/').to_string(),
                session,
                refresh: RefreshCoordinator::new(),
                on_expiry,
            }),
        })
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    #[must_use]
    pub fn refresh_coordinator(&self) -> &RefreshCoordinator {
        &self.inner.refresh
    }

    /// Send a request through the pipeline.
    ///
    /// # Errors
    ///
    /// - `ApiError::SessionExpired` if a refresh was needed and failed
    /// - `ApiError::Unauthorized` if the backend rejects even a fresh token,
    ///   or credentials on an auth endpoint
    /// - `ApiError::Status` for other non-success responses
    /// - `ApiError::Http` on transport failure
    #[instrument(skip(self, request), fields(method = %request.method(), path = %request.path()))]
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let sent_with = self.inner.session.access_token();

        match self.dispatch(&request, sent_with.as_ref()).await {
            Err(ApiError::Unauthorized { .. }) if !request.is_auth_endpoint() => {
                self.recover(&request, sent_with.as_ref()).await
            }
            other => other,
        }
    }

    /// Send a request and deserialize the response body.
    ///
    /// # Errors
    ///
    /// Everything [`send`](Self::send) returns, plus `ApiError::Parse`.
    pub async fn json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        self.send(request).await?.json()
    }

    /// `PUT` bytes straight to a presigned object-storage URL.
    ///
    /// Bypasses the pipeline: the URL is signed, so no bearer token is sent
    /// and a rejection is never a reason to refresh.
    ///
    /// # Errors
    ///
    /// - `ApiError::Url` if `upload_url` is not absolute
    /// - `ApiError::Status` if storage rejects the upload
    /// - `ApiError::Http` on transport failure
    #[instrument(skip(self, upload_url, bytes), fields(size = bytes.len()))]
    pub async fn put_presigned(
        &self,
        upload_url: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), ApiError> {
        let url = Url::parse(upload_url)?;
        let response = self
            .inner
            .http
            .put(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(ApiError::Status {
            status,
            message: error_message(status, &text),
        })
    }

    async fn recover(
        &self,
        request: &ApiRequest,
        sent_with: Option<&SecretString>,
    ) -> Result<ApiResponse, ApiError> {
        if let Some(current) = self.inner.session.access_token()
            && sent_with.is_none_or(|sent| sent.expose_secret() != current.expose_secret())
        {
            tracing::debug!("Access token rotated while request was in flight, replaying");
            return self.dispatch(request, Some(&current)).await;
        }

        match self.inner.refresh.acquire() {
            RefreshTicket::Follower(pending) => {
                tracing::debug!("Token refresh in flight, waiting");
                let access = pending.wait().await.map_err(ApiError::SessionExpired)?;
                self.dispatch(request, Some(&access)).await
            }
            RefreshTicket::Leader(lease) => match self.refresh_credentials().await {
                Ok(pair) => {
                    self.inner.session.set_tokens(pair.clone());
                    let released = lease.succeed(pair.access());
                    tracing::info!(released, "Access token refreshed");
                    self.dispatch(request, Some(pair.access())).await
                }
                Err(error) => {
                    let rejected = lease.fail(&error);
                    tracing::warn!(error = %error, rejected, "Token refresh failed, ending session");
                    self.inner.session.logout();
                    self.inner.on_expiry.session_expired(&error);
                    Err(ApiError::SessionExpired(error))
                }
            },
        }
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        access: Option<&SecretString>,
    ) -> Result<ApiResponse, ApiError> {
        let url = request.url(&self.inner.base_url)?;
        let mut builder = self.inner.http.request(request.method().clone(), url);

        if let Some(access) = access {
            builder = builder.bearer_auth(access.expose_secret());
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        ApiResponse::from_response(response).await
    }

    /// Exchange the refresh token directly, outside the pipeline.
    #[instrument(skip(self))]
    async fn refresh_credentials(&self) -> Result<TokenPair, RefreshError> {
        let refresh = self
            .inner
            .session
            .refresh_token()
            .ok_or(RefreshError::MissingRefreshToken)?;

        let url = format!("{}{}", self.inner.base_url, endpoints::REFRESH);
        let response = self
            .inner
            .http
            .post(url)
            .json(&serde_json::json!({ "refreshToken": refresh.expose_secret() }))
            .send()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(RefreshError::Rejected {
                status: status.as_u16(),
                message: error_message(status, &text),
            });
        }

        let payload: TokenPayload = serde_json::from_str(&text)
            .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;
        Ok(payload.into())
    }
}
