//! Resource listing and mutation handlers.
//!
//! Mutations are plain form posts that redirect back to the listing with a
//! notice. Only an unusable session turns into an error response (a redirect
//! to the login page).

use askama::Template;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{Html, Redirect},
};
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use folio_core::ResourceId;

use super::views::{NavItem, NoticeView, PageView, TableView, UserView, nav, render, take_notices};
use crate::api::resources::{Capabilities, PageQuery};
use crate::api::{ResourceError, ResourceKind};
use crate::error::AppError;
use crate::middleware::CurrentAdmin;
use crate::notify::Notice;
use crate::paths;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "resource.html")]
pub struct ResourceTemplate {
    pub notices: Vec<NoticeView>,
    pub user: UserView,
    pub nav: Vec<NavItem>,
    pub label: &'static str,
    pub slug: &'static str,
    pub caps: Capabilities,
    pub table: TableView,
    pub pager: Option<PageView>,
}

/// Form body carrying a JSON document.
#[derive(Debug, Default, Deserialize)]
pub struct PayloadForm {
    #[serde(default)]
    pub payload: String,
}

/// GET /dashboard/{resource}
#[instrument(skip(state, admin))]
pub async fn index(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(resource): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let kind: ResourceKind = resource.parse()?;
    let list = state.resources().list(kind, page).await?;

    render(&ResourceTemplate {
        notices: take_notices(&state),
        user: UserView::from(&admin),
        nav: nav(Some(kind)),
        label: kind.label(),
        slug: kind.slug(),
        caps: kind.capabilities(),
        table: TableView::from_items(&list.items),
        pager: list.pagination.as_ref().map(|p| PageView::new(kind, p)),
    })
}

/// POST /dashboard/{resource}
#[instrument(skip(state, _admin, form))]
pub async fn create(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    Path(resource): Path<String>,
    Form(form): Form<PayloadForm>,
) -> Result<Redirect, AppError> {
    let kind: ResourceKind = resource.parse()?;
    let back = paths::resource(kind.slug());

    let Some(payload) = parse_payload(&state, &form.payload) else {
        return Ok(Redirect::to(&back));
    };

    match state.resources().create(kind, payload).await {
        Ok(_) => state
            .notices()
            .push(Notice::success(format!("{} entry created", kind.label()))),
        Err(e) => report(&state, e, "create")?,
    }
    Ok(Redirect::to(&back))
}

/// POST /dashboard/{resource}/{id}
#[instrument(skip(state, _admin, form))]
pub async fn update(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    Path((resource, id)): Path<(String, String)>,
    Form(form): Form<PayloadForm>,
) -> Result<Redirect, AppError> {
    let kind: ResourceKind = resource.parse()?;
    let back = paths::resource(kind.slug());

    let Some(payload) = parse_payload(&state, &form.payload) else {
        return Ok(Redirect::to(&back));
    };

    match state
        .resources()
        .update(kind, &ResourceId::new(id), payload)
        .await
    {
        Ok(_) => state
            .notices()
            .push(Notice::success(format!("{} entry updated", kind.label()))),
        Err(e) => report(&state, e, "update")?,
    }
    Ok(Redirect::to(&back))
}

/// POST /dashboard/{resource}/{id}/{action}
#[instrument(skip(state, _admin))]
pub async fn action(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    Path((resource, id, action)): Path<(String, String, String)>,
) -> Result<Redirect, AppError> {
    let kind: ResourceKind = resource.parse()?;
    let back = paths::resource(kind.slug());
    let id = ResourceId::new(id);
    let resources = state.resources();

    let (result, done) = match action.as_str() {
        "delete" => (resources.delete(kind, &id).await, "deleted"),
        "read" if kind.capabilities().mark_read => (resources.mark_read(&id).await, "marked as read"),
        "activate" if kind.capabilities().activate => (resources.activate(&id).await, "activated"),
        "read" | "activate" => {
            return Err(ResourceError::Unsupported {
                kind,
                action: if action == "read" { "mark_read" } else { "activate" },
            }
            .into());
        }
        other => return Err(AppError::NotFound(format!("action '{other}'"))),
    };

    match result {
        Ok(()) => state
            .notices()
            .push(Notice::success(format!("{} entry {done}", kind.label()))),
        Err(e) => report(&state, e, &action)?,
    }
    Ok(Redirect::to(&back))
}

/// Parse a JSON object from the form, queueing an error notice otherwise.
fn parse_payload(state: &AppState, raw: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => Some(value),
        Ok(_) => {
            state
                .notices()
                .push(Notice::error("Invalid payload").with_description("Expected a JSON object."));
            None
        }
        Err(e) => {
            state
                .notices()
                .push(Notice::error("Invalid JSON").with_description(e.to_string()));
            None
        }
    }
}

/// Turn a failed mutation into a notice, unless the session is unusable.
fn report(state: &AppState, err: ResourceError, action: &str) -> Result<(), AppError> {
    match err {
        ResourceError::Api(api) if api.needs_login() => Err(api.into()),
        other => {
            tracing::warn!(error = %other, action, "Resource mutation failed");
            let description = match &other {
                ResourceError::Api(api) => api.user_message(),
                _ => other.to_string(),
            };
            state.notices().push(
                Notice::error(format!("Could not complete: {action}")).with_description(description),
            );
            Ok(())
        }
    }
}
