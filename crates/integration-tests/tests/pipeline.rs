//! Authenticated request pipeline against the fake backend.
//!
//! Covers bearer attachment, single-flight refresh, replay and forced
//! logout.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use futures::future::join_all;
use secrecy::ExposeSecret;

use folio_admin::api::resources::PageQuery;
use folio_admin::api::{ApiError, RefreshError, ResourceError, ResourceKind};
use folio_admin::session::MemoryStorage;
use folio_core::LoginForm;
use folio_integration_tests::{FakeBackend, PASSWORD};

const KINDS: [ResourceKind; 5] = [
    ResourceKind::Projects,
    ResourceKind::Blogs,
    ResourceKind::Tags,
    ResourceKind::Careers,
    ResourceKind::Contacts,
];

#[tokio::test]
async fn test_valid_token_is_attached_and_not_refreshed() {
    let backend = FakeBackend::start().await;
    let (state, pair) = backend.signed_in_state();

    let list = state
        .resources()
        .list(ResourceKind::Projects, PageQuery::default())
        .await
        .unwrap();

    assert_eq!(list.total(), 0);
    assert_eq!(backend.refresh_calls(), 0);
    assert_eq!(
        backend.seen_tokens(),
        vec![Some(pair.access().expose_secret().to_string())]
    );
}

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let backend = FakeBackend::start().await;
    let (state, pair) = backend.signed_in_state();
    backend.expire_access_tokens();
    backend.set_refresh_delay(Duration::from_millis(200));

    let results = join_all(
        KINDS
            .into_iter()
            .map(|kind| state.resources().list(kind, PageQuery::default())),
    )
    .await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(backend.refresh_calls(), 1);

    let current = state.session().access_token().unwrap();
    assert_ne!(current.expose_secret(), pair.access().expose_secret());

    // Every original attempt went out with the old token, every replay with
    // the refreshed one.
    let seen = backend.seen_tokens();
    assert_eq!(seen.len(), KINDS.len() * 2);
    let old = Some(pair.access().expose_secret().to_string());
    let new = Some(current.expose_secret().to_string());
    assert_eq!(seen.iter().filter(|t| **t == old).count(), KINDS.len());
    assert_eq!(seen.iter().filter(|t| **t == new).count(), KINDS.len());
}

#[tokio::test]
async fn test_failed_refresh_rejects_queue_and_forces_logout() {
    let backend = FakeBackend::start().await;
    let storage = Arc::new(MemoryStorage::default());
    let state = backend.admin_state(storage.clone());
    state.session().hydrate();
    state.session().login(backend.issue_tokens(), None);

    backend.expire_access_tokens();
    backend.fail_refresh_with(StatusCode::UNAUTHORIZED);
    backend.set_refresh_delay(Duration::from_millis(150));

    let results = join_all(
        KINDS
            .into_iter()
            .take(3)
            .map(|kind| state.resources().list(kind, PageQuery::default())),
    )
    .await;

    for result in results {
        match result {
            Err(ResourceError::Api(e)) => assert!(e.is_session_expired(), "unexpected {e}"),
            other => panic!("expected session expiry, got {other:?}"),
        }
    }

    assert_eq!(backend.refresh_calls(), 1);
    assert!(!state.session().is_authenticated());
    assert!(storage.snapshot().is_none());
    assert_eq!(state.navigator().pending().as_deref(), Some("/auth"));

    let notices = state.notices().drain();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices.first().unwrap().title, "Session expired");
}

#[tokio::test]
async fn test_replayed_request_is_not_recovered_twice() {
    let backend = FakeBackend::start().await;
    let (state, _) = backend.signed_in_state();
    backend.reject_all_tokens();

    let err = state
        .resources()
        .list(ResourceKind::Blogs, PageQuery::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ResourceError::Api(ApiError::Unauthorized { .. })
    ));
    assert_eq!(backend.refresh_calls(), 1);
    assert_eq!(backend.seen_tokens().len(), 2);
    // The refresh itself succeeded, so the session survives.
    assert!(state.session().is_authenticated());
}

#[tokio::test]
async fn test_missing_refresh_token_expires_without_calling_backend() {
    let backend = FakeBackend::start().await;
    let state = backend.admin_state(Arc::new(MemoryStorage::default()));
    state.session().hydrate();

    let err = state
        .resources()
        .list(ResourceKind::Tags, PageQuery::default())
        .await
        .unwrap_err();

    match err {
        ResourceError::Api(ApiError::SessionExpired(reason)) => {
            assert_eq!(reason, RefreshError::MissingRefreshToken);
        }
        other => panic!("expected session expiry, got {other:?}"),
    }
    assert_eq!(backend.refresh_calls(), 0);
    assert_eq!(backend.seen_tokens(), vec![None]);
}

#[tokio::test]
async fn test_login_401_never_triggers_refresh() {
    let backend = FakeBackend::start().await;
    let state = backend.admin_state(Arc::new(MemoryStorage::default()));
    state.session().hydrate();

    let form = LoginForm {
        email: "ada@example.com".to_string(),
        password: "wrong-password".to_string(),
    };
    let err = state.auth().login(&form.validate().unwrap()).await.unwrap_err();

    assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    assert_eq!(backend.refresh_calls(), 0);
    assert!(!state.session().is_authenticated());
}

#[tokio::test]
async fn test_login_stores_tokens_and_user() {
    let backend = FakeBackend::start().await;
    let storage = Arc::new(MemoryStorage::default());
    let state = backend.admin_state(storage.clone());
    state.session().hydrate();

    let form = LoginForm {
        email: "ada@example.com".to_string(),
        password: PASSWORD.to_string(),
    };
    let user = state.auth().login(&form.validate().unwrap()).await.unwrap();

    assert_eq!(user.name, "Ada");
    assert!(user.has_role("admin"));
    assert!(state.session().is_authenticated());
    assert_eq!(state.session().user(), Some(user));

    let persisted = storage.snapshot().unwrap();
    assert!(persisted.access_token.is_some());
    assert!(persisted.refresh_token.is_some());
    assert!(persisted.user.is_some());
}

#[tokio::test]
async fn test_explicit_refresh_rotates_pair() {
    let backend = FakeBackend::start().await;
    let (state, pair) = backend.signed_in_state();

    let fresh = state.auth().refresh().await.unwrap();

    assert_ne!(fresh.refresh().expose_secret(), pair.refresh().expose_secret());
    assert_eq!(
        state.session().refresh_token().unwrap().expose_secret(),
        fresh.refresh().expose_secret()
    );
    assert_eq!(backend.refresh_calls(), 1);
}

#[tokio::test]
async fn test_logout_clears_session() {
    let backend = FakeBackend::start().await;
    let storage = Arc::new(MemoryStorage::default());
    let state = backend.admin_state(storage.clone());
    state.session().hydrate();
    state.session().login(backend.issue_tokens(), None);

    state.auth().logout().await;

    assert!(!state.session().is_authenticated());
    assert!(state.session().access_token().is_none());
    assert!(storage.snapshot().is_none());
}
