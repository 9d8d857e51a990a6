//! Route guard for the dashboard.
//!
//! Evaluated against the session store on every protected request:
//!
//! 1. store not hydrated → wait (503, retried by the browser)
//! 2. not authenticated, or the browser's cookies do not belong to the
//!    stored session → `/auth`
//! 3. no user record yet → fetch it through the pipeline, then re-evaluate
//! 4. user lacks the privileged role → `/`
//! 5. otherwise render
//!
//! [`GuardWatch`] re-evaluates on every store change for observers outside
//! the request path.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, StatusCode, header::RETRY_AFTER, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tokio::sync::watch;

use folio_core::UserRecord;

use crate::error::set_sentry_user;
use crate::paths;
use crate::session::cookies::read_request_cookies;
use crate::session::{CookieMirror, Session, SessionStore};
use crate::state::AppState;

/// Outcome of evaluating the guard against a session snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Store not hydrated yet; render nothing.
    Pending,
    RedirectToLogin,
    /// Authenticated but the user record has not been fetched.
    NeedsUser,
    /// Authenticated user without the privileged role.
    RedirectHome,
    Allow(UserRecord),
}

/// Evaluate the guard.
#[must_use]
pub fn evaluate(session: &Session, privileged_role: &str) -> GuardDecision {
    if !session.is_hydrated {
        return GuardDecision::Pending;
    }
    if !session.is_authenticated() {
        return GuardDecision::RedirectToLogin;
    }
    match &session.user {
        None => GuardDecision::NeedsUser,
        Some(user) if user.has_role(privileged_role) => GuardDecision::Allow(user.clone()),
        Some(_) => GuardDecision::RedirectHome,
    }
}

/// Refuse a browser whose credential cookies do not belong to the session.
#[must_use]
pub fn admit_browser(decision: GuardDecision, mirror: &CookieMirror, headers: &HeaderMap) -> GuardDecision {
    if matches!(decision, GuardDecision::Pending | GuardDecision::RedirectToLogin)
        || mirror.recognizes(&read_request_cookies(headers))
    {
        return decision;
    }
    tracing::warn!("Credential cookies do not match the session");
    GuardDecision::RedirectToLogin
}

/// Middleware guarding every dashboard route.
pub async fn require_admin(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let role = state.config().privileged_role.as_str();
    let mut decision = admit_browser(
        evaluate(&state.session().snapshot(), role),
        &state.cookie_mirror(),
        request.headers(),
    );

    if decision == GuardDecision::NeedsUser {
        match state.auth().current_user().await {
            Ok(_) => decision = evaluate(&state.session().snapshot(), role),
            Err(e) => {
                tracing::warn!(error = %e, "Could not load current user");
                decision = GuardDecision::RedirectToLogin;
            }
        }
    }

    match decision {
        GuardDecision::Pending => {
            (StatusCode::SERVICE_UNAVAILABLE, [(RETRY_AFTER, "1")]).into_response()
        }
        GuardDecision::RedirectToLogin | GuardDecision::NeedsUser => {
            Redirect::to(paths::LOGIN).into_response()
        }
        GuardDecision::RedirectHome => {
            tracing::info!("Signed-in user lacks the privileged role");
            Redirect::to(paths::HOME).into_response()
        }
        GuardDecision::Allow(user) => {
            set_sentry_user(user.id.as_str(), Some(&user.email));
            request.extensions_mut().insert(CurrentAdmin(user));
            next.run(request).await
        }
    }
}

/// The privileged user admitted by [`require_admin`].
#[derive(Debug, Clone)]
pub struct CurrentAdmin(pub UserRecord);

/// Rejection when [`CurrentAdmin`] is used outside the guarded router.
#[derive(Debug)]
pub struct NotAdmitted;

impl IntoResponse for NotAdmitted {
    fn into_response(self) -> Response {
        Redirect::to(paths::LOGIN).into_response()
    }
}

impl<S> FromRequestParts<S> for CurrentAdmin
where
    S: Send + Sync,
{
    type Rejection = NotAdmitted;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Self>().cloned().ok_or(NotAdmitted)
    }
}

/// Guard re-evaluated whenever the session store changes.
#[derive(Debug)]
pub struct GuardWatch {
    changes: watch::Receiver<Session>,
    privileged_role: String,
}

impl GuardWatch {
    #[must_use]
    pub fn new(store: &SessionStore, privileged_role: impl Into<String>) -> Self {
        Self {
            changes: store.subscribe(),
            privileged_role: privileged_role.into(),
        }
    }

    /// Decision for the latest snapshot.
    #[must_use]
    pub fn current(&self) -> GuardDecision {
        evaluate(&self.changes.borrow(), &self.privileged_role)
    }

    /// Wait for the next store change. `None` once the store is gone.
    pub async fn changed(&mut self) -> Option<GuardDecision> {
        self.changes.changed().await.ok()?;
        Some(self.current())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::http::{HeaderValue, header::COOKIE};
    use folio_core::{Role, TokenPair, UserId};

    use super::*;
    use crate::session::{EdgeChannel, MemoryStorage};

    fn user(role: Option<&str>) -> UserRecord {
        UserRecord {
            id: UserId::new("u-1"),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            role: role.map(Role::new),
            created_at: None,
            updated_at: None,
        }
    }

    fn session(hydrated: bool, signed_in: bool, user: Option<UserRecord>) -> Session {
        Session {
            credentials: signed_in.then(|| TokenPair::new("a", "r")),
            user,
            is_hydrated: hydrated,
        }
    }

    #[test]
    fn test_pending_until_hydrated() {
        let s = session(false, true, Some(user(Some("ADMIN"))));
        assert_eq!(evaluate(&s, "ADMIN"), GuardDecision::Pending);
    }

    #[test]
    fn test_unauthenticated_goes_to_login() {
        assert_eq!(
            evaluate(&session(true, false, None), "ADMIN"),
            GuardDecision::RedirectToLogin
        );
    }

    #[test]
    fn test_missing_user_is_fetched() {
        assert_eq!(
            evaluate(&session(true, true, None), "ADMIN"),
            GuardDecision::NeedsUser
        );
    }

    #[test]
    fn test_role_check() {
        let editor = session(true, true, Some(user(Some("EDITOR"))));
        assert_eq!(evaluate(&editor, "ADMIN"), GuardDecision::RedirectHome);

        let no_role = session(true, true, Some(user(None)));
        assert_eq!(evaluate(&no_role, "ADMIN"), GuardDecision::RedirectHome);

        let admin = session(true, true, Some(user(Some("admin"))));
        assert!(matches!(evaluate(&admin, "ADMIN"), GuardDecision::Allow(_)));
    }

    fn cookie_headers(raw: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(raw).unwrap());
        headers
    }

    #[test]
    fn test_browser_must_hold_session_cookies() {
        let mirror = CookieMirror::new(false);
        mirror.publish(Some(&TokenPair::new("a", "r")));
        let allow = GuardDecision::Allow(user(Some("ADMIN")));

        let owner = cookie_headers("accessToken=a; refreshToken=r");
        assert_eq!(admit_browser(allow.clone(), &mirror, &owner), allow);

        let refresh_only = cookie_headers("refreshToken=r");
        assert_eq!(admit_browser(allow.clone(), &mirror, &refresh_only), allow);

        let forged = cookie_headers("accessToken=forged");
        assert_eq!(
            admit_browser(allow.clone(), &mirror, &forged),
            GuardDecision::RedirectToLogin
        );
        assert_eq!(
            admit_browser(GuardDecision::NeedsUser, &mirror, &HeaderMap::new()),
            GuardDecision::RedirectToLogin
        );
        assert_eq!(
            admit_browser(GuardDecision::Pending, &mirror, &forged),
            GuardDecision::Pending
        );
    }

    #[tokio::test]
    async fn test_guard_watch_follows_store() {
        let store = SessionStore::new(
            Arc::new(MemoryStorage::default()),
            Arc::new(CookieMirror::new(false)),
        );
        let mut watch = GuardWatch::new(&store, "ADMIN");
        assert_eq!(watch.current(), GuardDecision::Pending);

        store.hydrate();
        assert_eq!(watch.changed().await, Some(GuardDecision::RedirectToLogin));

        store.login(TokenPair::new("a", "r"), Some(user(Some("ADMIN"))));
        assert!(matches!(watch.changed().await, Some(GuardDecision::Allow(_))));

        store.logout();
        assert_eq!(watch.changed().await, Some(GuardDecision::RedirectToLogin));
    }
}
