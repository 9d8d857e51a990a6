//! Application state shared across handlers.

use std::sync::Arc;

use crate::api::{ApiClient, ApiError, AuthService, ResourceClient};
use crate::config::FolioConfig;
use crate::notify::{ForcedLogout, Navigator, NoticeBoard};
use crate::session::{CookieMirror, FileStorage, SessionStorage, SessionStore};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: FolioConfig,
    session: SessionStore,
    mirror: Arc<CookieMirror>,
    api: ApiClient,
    auth: AuthService,
    resources: ResourceClient,
    notices: NoticeBoard,
    navigator: Navigator,
}

impl AppState {
    /// Build state with the session persisted to the configured file.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the HTTP client cannot be created.
    pub fn new(config: FolioConfig) -> Result<Self, ApiError> {
        let storage = Arc::new(FileStorage::new(config.session_file.clone()));
        Self::with_storage(config, storage)
    }

    /// Build state over an explicit storage backend.
    ///
    /// The store is not hydrated; call `session().hydrate()` once at startup.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the HTTP client cannot be created.
    pub fn with_storage(
        config: FolioConfig,
        storage: Arc<dyn SessionStorage>,
    ) -> Result<Self, ApiError> {
        let mirror = Arc::new(CookieMirror::new(config.secure_cookies()));
        let session = SessionStore::new(storage, mirror.clone());

        let notices = NoticeBoard::default();
        let navigator = Navigator::default();
        let on_expiry = Arc::new(ForcedLogout::new(notices.clone(), navigator.clone()));

        let api = ApiClient::new(
            &config.api_base_url,
            config.request_timeout,
            session.clone(),
            on_expiry,
        )?;
        let auth = AuthService::new(api.clone());
        let resources = ResourceClient::new(api.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                session,
                mirror,
                api,
                auth,
                resources,
                notices,
                navigator,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &FolioConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    #[must_use]
    pub fn cookie_mirror(&self) -> Arc<CookieMirror> {
        self.inner.mirror.clone()
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    #[must_use]
    pub fn auth(&self) -> &AuthService {
        &self.inner.auth
    }

    #[must_use]
    pub fn resources(&self) -> &ResourceClient {
        &self.inner.resources
    }

    #[must_use]
    pub fn notices(&self) -> &NoticeBoard {
        &self.inner.notices
    }

    #[must_use]
    pub fn navigator(&self) -> &Navigator {
        &self.inner.navigator
    }
}
