//! Keeps browser cookies in line with the session store.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderValue, header::SET_COOKIE},
    middleware::Next,
    response::Response,
};

use crate::session::{CookieMirror, CredentialGrant};
use crate::session::cookies::read_request_cookies;

/// Observe inbound credential cookies, run the request, then append the
/// `Set-Cookie` headers needed to match the mirror.
///
/// Credential values reach only the browser the mirror recognizes, or the
/// one whose response carries a [`CredentialGrant`].
pub async fn sync_cookies(
    State(mirror): State<Arc<CookieMirror>>,
    request: Request,
    next: Next,
) -> Response {
    let inbound = read_request_cookies(request.headers());
    mirror.observe(&inbound);

    let mut response = next.run(request).await;
    let granted = response.extensions_mut().remove::<CredentialGrant>().is_some();

    for cookie in mirror.reconcile(&inbound, granted) {
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => tracing::warn!(error = %e, name = cookie.name(), "Unencodable cookie"),
        }
    }

    response
}
