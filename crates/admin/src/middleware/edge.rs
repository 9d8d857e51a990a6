//! Edge filter: cookie-only routing before any page logic runs.
//!
//! Runs on every page request and sees nothing but the credential cookies.
//! A session exists if either cookie is present.
//!
//! | Path              | Session | Action                     |
//! |-------------------|---------|----------------------------|
//! | `/dashboard[/..]` | no      | redirect to `/auth`        |
//! | `/auth[/..]`      | yes     | redirect to `/dashboard`   |
//! | anything else     | any     | pass                       |
//!
//! Static assets, health checks and API-style paths are never filtered.

use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::paths;
use crate::session::cookies::read_request_cookies;

const EXCLUDED_PREFIXES: &[&str] = &["/api", "/static", "/health"];
const EXCLUDED_FILES: &[&str] = &["/favicon.ico", "/sitemap.xml", "/robots.txt"];
const EXCLUDED_EXTENSIONS: &[&str] = &[".svg", ".png", ".jpg", ".jpeg", ".gif", ".webp", ".ico"];

/// What the edge filter does with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeAction {
    Pass,
    Redirect(&'static str),
}

/// `path` equals `prefix` or continues it with a `/`.
fn is_under(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Paths the filter never looks at.
#[must_use]
pub fn is_excluded(path: &str) -> bool {
    EXCLUDED_PREFIXES.iter().any(|prefix| is_under(path, prefix))
        || EXCLUDED_FILES.contains(&path)
        || EXCLUDED_EXTENSIONS
            .iter()
            .any(|ext| path.to_ascii_lowercase().ends_with(ext))
}

/// Decide the edge action for a path.
#[must_use]
pub fn classify(path: &str, has_session: bool) -> EdgeAction {
    if is_excluded(path) {
        return EdgeAction::Pass;
    }

    // Logout is a dashboard action; it must reach the handler with cookies.
    if is_under(path, paths::DASHBOARD) && !has_session {
        return EdgeAction::Redirect(paths::LOGIN);
    }

    if is_under(path, paths::LOGIN) && has_session {
        return EdgeAction::Redirect(paths::DASHBOARD);
    }

    EdgeAction::Pass
}

/// Edge filter middleware.
pub async fn edge_filter(request: Request, next: Next) -> Response {
    let has_session = read_request_cookies(request.headers()).has_session();

    match classify(request.uri().path(), has_session) {
        EdgeAction::Pass => next.run(request).await,
        EdgeAction::Redirect(target) => {
            tracing::debug!(path = %request.uri().path(), target, "Edge redirect");
            Redirect::to(target).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dashboard_requires_session() {
        assert_eq!(classify("/dashboard", false), EdgeAction::Redirect("/auth"));
        assert_eq!(
            classify("/dashboard/projects", false),
            EdgeAction::Redirect("/auth")
        );
        assert_eq!(classify("/dashboard", true), EdgeAction::Pass);
        assert_eq!(classify("/dashboard/projects", true), EdgeAction::Pass);
    }

    #[test]
    fn test_auth_bounces_signed_in_users() {
        assert_eq!(classify("/auth", true), EdgeAction::Redirect("/dashboard"));
        assert_eq!(classify("/auth/login", true), EdgeAction::Redirect("/dashboard"));
        assert_eq!(classify("/auth", false), EdgeAction::Pass);
    }

    #[test]
    fn test_prefix_must_end_at_segment() {
        assert_eq!(classify("/dashboards", false), EdgeAction::Pass);
        assert_eq!(classify("/authors", true), EdgeAction::Pass);
    }

    #[test]
    fn test_public_and_excluded_paths_pass() {
        assert_eq!(classify("/", false), EdgeAction::Pass);
        assert_eq!(classify("/", true), EdgeAction::Pass);
        assert_eq!(classify("/health", false), EdgeAction::Pass);
        assert_eq!(classify("/static/app.css", false), EdgeAction::Pass);
        assert_eq!(classify("/favicon.ico", true), EdgeAction::Pass);
        assert_eq!(classify("/dashboard/logo.PNG", false), EdgeAction::Pass);
        assert_eq!(classify("/api/anything", false), EdgeAction::Pass);
    }

    #[test]
    fn test_only_own_asset_prefixes_are_excluded() {
        assert!(!is_excluded("/_next/data.json"));
        assert!(is_excluded("/static"));
    }
}
