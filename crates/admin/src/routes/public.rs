//! Public landing page.

use askama::Template;
use axum::{extract::State, http::HeaderMap, response::Html};

use super::views::{NoticeView, UserView, render, take_notices};
use crate::error::AppError;
use crate::session::cookies::read_request_cookies;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub notices: Vec<NoticeView>,
    pub user: Option<UserView>,
    pub signed_in: bool,
}

/// GET /
///
/// The session is only shown to the browser holding it.
pub async fn home(State(state): State<AppState>, headers: HeaderMap) -> Result<Html<String>, AppError> {
    let session = state.session().snapshot();
    let owner = state
        .cookie_mirror()
        .recognizes(&read_request_cookies(&headers));
    render(&HomeTemplate {
        notices: take_notices(&state),
        user: session.user.as_ref().filter(|_| owner).map(UserView::from),
        signed_in: owner && session.is_authenticated(),
    })
}
