//! Performs redirects scheduled outside the request path.
//!
//! A forced logout happens deep inside the request pipeline, often while
//! rendering an unrelated page. It schedules a redirect on the
//! [`Navigator`]; the next page request picks it up here.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use super::edge::is_excluded;
use crate::notify::Navigator;

pub async fn pending_navigation(
    State(navigator): State<Navigator>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if is_excluded(path) {
        return next.run(request).await;
    }

    if let Some(target) = navigator.take()
        && target != path
    {
        tracing::debug!(from = %path, to = %target, "Performing pending redirect");
        return Redirect::to(&target).into_response();
    }

    next.run(request).await
}
