//! Authentication session store.
//!
//! The single owner of the current credential pair, the authenticated user
//! and the hydration flag. Every mutation is applied under one lock, then
//! mirrored to the edge cookies, written to durable storage and broadcast to
//! subscribers, in that order.
//!
//! # Hydration
//!
//! The store starts empty and not hydrated. [`SessionStore::hydrate`] loads
//! the persisted session exactly once. Until then the token getters fall back
//! to whatever the edge channel has observed, so the request pipeline can
//! authenticate calls made while the dashboard is still starting up.

pub mod cookies;
pub mod storage;

use std::sync::Arc;

use folio_core::{TokenPair, UserRecord};
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::watch;

pub use cookies::{CookieMirror, CredentialCookies, CredentialGrant, EdgeChannel};
pub use storage::{FileStorage, MemoryStorage, PersistedSession, SessionStorage, StorageError};

/// Snapshot of the authentication state.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub credentials: Option<TokenPair>,
    pub user: Option<UserRecord>,
    pub is_hydrated: bool,
}

impl Session {
    /// Authenticated means a credential pair is held. Derived, never stored.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }

    fn to_persisted(&self) -> PersistedSession {
        PersistedSession {
            access_token: self
                .credentials
                .as_ref()
                .map(|pair| pair.access().expose_secret().to_owned()),
            refresh_token: self
                .credentials
                .as_ref()
                .map(|pair| pair.refresh().expose_secret().to_owned()),
            user: self.user.clone(),
        }
    }
}

/// How a mutation reaches the edge channel.
#[derive(Debug, Clone, Copy)]
enum Publish {
    Replace,
    Rotate,
}

/// Shared handle to the session store.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionStoreInner>,
}

struct SessionStoreInner {
    state: Mutex<Session>,
    storage: Arc<dyn SessionStorage>,
    edge: Arc<dyn EdgeChannel>,
    changes: watch::Sender<Session>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("state", &*self.inner.state.lock())
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Create an empty, not-yet-hydrated store.
    #[must_use]
    pub fn new(storage: Arc<dyn SessionStorage>, edge: Arc<dyn EdgeChannel>) -> Self {
        let (changes, _) = watch::channel(Session::default());
        Self {
            inner: Arc::new(SessionStoreInner {
                state: Mutex::new(Session::default()),
                storage,
                edge,
                changes,
            }),
        }
    }

    /// Load the persisted session. Returns `true` only on the first call.
    ///
    /// Always republishes to the edge channel so stale browser cookies from a
    /// previous run are cleared when nothing was restored.
    pub fn hydrate(&self) -> bool {
        let mut state = self.inner.state.lock();
        if state.is_hydrated {
            return false;
        }

        match self.inner.storage.load() {
            Ok(Some(persisted)) if state.credentials.is_none() => {
                if let (Some(access), Some(refresh)) =
                    (persisted.access_token, persisted.refresh_token)
                {
                    state.credentials = Some(TokenPair::new(access, refresh));
                    state.user = persisted.user;
                    tracing::info!("Restored persisted session");
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Failed to load persisted session"),
        }

        state.is_hydrated = true;
        self.inner.edge.publish(state.credentials.as_ref());
        self.inner.changes.send_replace(state.clone());
        true
    }

    /// Store a fresh credential pair and optional user.
    pub fn login(&self, credentials: TokenPair, user: Option<UserRecord>) {
        self.mutate(Publish::Replace, |state| {
            state.credentials = Some(credentials);
            state.user = user;
        });
    }

    /// Replace the credential pair after a refresh, keeping the user.
    ///
    /// Published as a rotation so the browser holding the old pair is still
    /// recognized and receives the new one.
    pub fn set_tokens(&self, credentials: TokenPair) {
        self.mutate(Publish::Rotate, |state| state.credentials = Some(credentials));
    }

    /// Replace the user record.
    pub fn set_user(&self, user: UserRecord) {
        self.mutate(Publish::Replace, |state| state.user = Some(user));
    }

    /// Forget credentials and user everywhere.
    pub fn logout(&self) {
        self.mutate(Publish::Replace, |state| {
            state.credentials = None;
            state.user = None;
        });
    }

    /// Current access token, falling back to the edge before hydration.
    #[must_use]
    pub fn access_token(&self) -> Option<SecretString> {
        let state = self.inner.state.lock();
        if let Some(pair) = &state.credentials {
            return Some(pair.access().clone());
        }
        if state.is_hydrated {
            None
        } else {
            self.inner.edge.peek().access
        }
    }

    /// Current refresh token, falling back to the edge before hydration.
    #[must_use]
    pub fn refresh_token(&self) -> Option<SecretString> {
        let state = self.inner.state.lock();
        if let Some(pair) = &state.credentials {
            return Some(pair.refresh().clone());
        }
        if state.is_hydrated {
            None
        } else {
            self.inner.edge.peek().refresh
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.inner.state.lock().clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.state.lock().is_authenticated()
    }

    #[must_use]
    pub fn is_hydrated(&self) -> bool {
        self.inner.state.lock().is_hydrated
    }

    #[must_use]
    pub fn user(&self) -> Option<UserRecord> {
        self.inner.state.lock().user.clone()
    }

    /// Receive a snapshot after every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.changes.subscribe()
    }

    fn mutate(&self, publish: Publish, apply: impl FnOnce(&mut Session)) {
        let mut state = self.inner.state.lock();
        apply(&mut state);

        match (publish, state.credentials.as_ref()) {
            (Publish::Rotate, Some(pair)) => self.inner.edge.rotate(pair),
            (_, credentials) => self.inner.edge.publish(credentials),
        }

        // Blocking storage I/O under the lock is intended: disk order must
        // equal mutation order. The file is tiny and only written on sign-in,
        // refresh and sign-out.
        let persisted = state.to_persisted();
        let result = if persisted.is_empty() {
            self.inner.storage.clear()
        } else {
            self.inner.storage.save(&persisted)
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to persist session");
        }

        self.inner.changes.send_replace(state.clone());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use folio_core::{Role, UserId};

    use super::*;

    fn user(role: &str) -> UserRecord {
        UserRecord {
            id: UserId::new("u-1"),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            role: Some(Role::new(role)),
            created_at: None,
            updated_at: None,
        }
    }

    fn store_with(storage: Arc<MemoryStorage>) -> (SessionStore, Arc<CookieMirror>) {
        let mirror = Arc::new(CookieMirror::new(false));
        (SessionStore::new(storage, mirror.clone()), mirror)
    }

    #[test]
    fn test_login_mirrors_everywhere() {
        let storage = Arc::new(MemoryStorage::default());
        let (store, mirror) = store_with(storage.clone());
        let mut changes = store.subscribe();

        store.login(TokenPair::new("a1", "r1"), Some(user("ADMIN")));

        assert!(store.is_authenticated());
        assert_eq!(mirror.peek().access.unwrap().expose_secret(), "a1");
        let persisted = storage.snapshot().unwrap();
        assert_eq!(persisted.refresh_token.as_deref(), Some("r1"));
        assert!(persisted.user.is_some());
        assert!(changes.has_changed().unwrap());
        assert!(changes.borrow_and_update().is_authenticated());
    }

    #[test]
    fn test_set_tokens_keeps_user() {
        let (store, _) = store_with(Arc::new(MemoryStorage::default()));
        store.login(TokenPair::new("a1", "r1"), Some(user("ADMIN")));
        store.set_tokens(TokenPair::new("a2", "r2"));

        let session = store.snapshot();
        assert!(session.credentials.unwrap().same_as(&TokenPair::new("a2", "r2")));
        assert!(session.user.is_some());
    }

    #[test]
    fn test_refresh_keeps_old_browser_recognized() {
        let (store, mirror) = store_with(Arc::new(MemoryStorage::default()));
        store.login(TokenPair::new("a1", "r1"), Some(user("ADMIN")));
        store.set_tokens(TokenPair::new("a2", "r2"));

        let old = CredentialCookies::from_pair(Some(&TokenPair::new("a1", "r1")));
        assert!(mirror.recognizes(&old));

        store.login(TokenPair::new("a3", "r3"), None);
        assert!(!mirror.recognizes(&old));
    }

    #[test]
    fn test_logout_clears_everything() {
        let storage = Arc::new(MemoryStorage::default());
        let (store, mirror) = store_with(storage.clone());
        store.login(TokenPair::new("a1", "r1"), Some(user("ADMIN")));
        store.logout();

        assert!(!store.is_authenticated());
        assert!(store.user().is_none());
        assert!(!mirror.peek().has_session());
        assert!(storage.snapshot().is_none());
    }

    #[test]
    fn test_hydrate_restores_once() {
        let storage = Arc::new(MemoryStorage::with_session(PersistedSession {
            access_token: Some("a1".to_string()),
            refresh_token: Some("r1".to_string()),
            user: Some(user("ADMIN")),
        }));
        let (store, mirror) = store_with(storage);

        assert!(!store.is_hydrated());
        assert!(store.hydrate());
        assert!(!store.hydrate());

        let session = store.snapshot();
        assert!(session.is_hydrated);
        assert!(session.is_authenticated());
        assert_eq!(session.user.unwrap().name, "Ada");
        assert_eq!(mirror.peek().refresh.unwrap().expose_secret(), "r1");
    }

    #[test]
    fn test_hydrate_without_storage_publishes_signed_out() {
        let (store, mirror) = store_with(Arc::new(MemoryStorage::default()));
        mirror.observe(&CredentialCookies {
            access: Some(SecretString::from("stale".to_string())),
            refresh: None,
        });

        assert!(store.hydrate());
        assert!(!store.is_authenticated());
        assert!(!mirror.peek().has_session());
    }

    #[test]
    fn test_tokens_fall_back_to_edge_before_hydration() {
        let (store, mirror) = store_with(Arc::new(MemoryStorage::default()));
        mirror.observe(&CredentialCookies {
            access: Some(SecretString::from("edge-a".to_string())),
            refresh: Some(SecretString::from("edge-r".to_string())),
        });

        assert_eq!(store.access_token().unwrap().expose_secret(), "edge-a");
        assert_eq!(store.refresh_token().unwrap().expose_secret(), "edge-r");

        store.hydrate();
        assert!(store.access_token().is_none());
        assert!(store.refresh_token().is_none());
    }

    #[test]
    fn test_hydrate_keeps_login_made_before_it() {
        let storage = Arc::new(MemoryStorage::with_session(PersistedSession {
            access_token: Some("old-a".to_string()),
            refresh_token: Some("old-r".to_string()),
            user: None,
        }));
        let (store, _) = store_with(storage);
        store.login(TokenPair::new("new-a", "new-r"), None);
        store.hydrate();

        assert_eq!(store.access_token().unwrap().expose_secret(), "new-a");
    }
}
