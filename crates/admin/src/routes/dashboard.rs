//! Dashboard overview.

use std::collections::HashMap;

use askama::Template;
use axum::{extract::State, response::Html};
use tokio::task::JoinSet;
use tracing::instrument;

use super::views::{NavItem, NoticeView, UserView, nav, render, take_notices};
use crate::api::{ResourceError, ResourceKind};
use crate::api::resources::PageQuery;
use crate::error::AppError;
use crate::middleware::CurrentAdmin;
use crate::paths;
use crate::state::AppState;

/// Count card on the overview.
#[derive(Debug, Clone)]
pub struct CountCard {
    pub label: &'static str,
    pub href: String,
    pub count: String,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub notices: Vec<NoticeView>,
    pub user: UserView,
    pub nav: Vec<NavItem>,
    pub cards: Vec<CountCard>,
    pub token_expiry: Option<String>,
}

/// GET /dashboard
///
/// Counts every resource kind concurrently. With an expired access token all
/// of these hit 401 together and share a single refresh.
#[instrument(skip(state, admin))]
pub async fn overview(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
) -> Result<Html<String>, AppError> {
    let mut tasks = JoinSet::new();
    for kind in ResourceKind::ALL {
        let resources = state.resources().clone();
        tasks.spawn(async move { (kind, resources.list(kind, PageQuery::default()).await) });
    }

    let mut counts = HashMap::new();
    while let Some(joined) = tasks.join_next().await {
        let (kind, result) = joined.map_err(|e| AppError::Internal(format!("count task failed: {e}")))?;
        match result {
            Ok(list) => {
                counts.insert(kind, list.total());
            }
            Err(ResourceError::Api(e)) if e.needs_login() => return Err(e.into()),
            Err(e) => tracing::warn!(kind = %kind, error = %e, "Failed to count resources"),
        }
    }

    let cards = ResourceKind::ALL
        .into_iter()
        .map(|kind| CountCard {
            label: kind.label(),
            href: paths::resource(kind.slug()),
            count: counts
                .get(&kind)
                .map_or_else(|| "n/a".to_string(), ToString::to_string),
        })
        .collect();

    let token_expiry = state
        .session()
        .snapshot()
        .credentials
        .and_then(|pair| pair.access_claims())
        .and_then(|claims| claims.expires_at())
        .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string());

    render(&DashboardTemplate {
        notices: take_notices(&state),
        user: UserView::from(&admin),
        nav: nav(None),
        cards,
        token_expiry,
    })
}
