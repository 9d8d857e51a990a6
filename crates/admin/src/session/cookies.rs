//! Browser cookie mirror of the credential pair.
//!
//! The edge filter runs before any session logic and can only see cookies,
//! so the session store publishes every credential change here. The mirror
//! remembers what the browser should hold and the cookie middleware diffs
//! that against what each request carries, emitting `Set-Cookie` headers for
//! the difference.
//!
//! Credential values only go to a browser the mirror recognizes: one whose
//! inbound cookies match the current pair or the pair it rotated from, or
//! the browser whose own request was granted the credentials (sign-in).
//! Any other browser carrying credential cookies gets removals.
//!
//! Cookies are deliberately readable (not `HttpOnly`), live for seven days,
//! use `SameSite=Lax` and are `Secure` only when the dashboard is served over
//! HTTPS.

use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use folio_core::TokenPair;
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use tower_sessions::cookie::time::Duration;
use tower_sessions::cookie::{Cookie, SameSite};

/// Cookie holding the access token.
pub const ACCESS_COOKIE: &str = "accessToken";

/// Cookie holding the refresh token.
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Lifetime of both cookies.
pub const COOKIE_MAX_AGE_DAYS: i64 = 7;

/// Credential values as seen by the edge (cookie jar contents).
#[derive(Debug, Clone, Default)]
pub struct CredentialCookies {
    pub access: Option<SecretString>,
    pub refresh: Option<SecretString>,
}

impl CredentialCookies {
    /// Either inbound cookie equals the matching value held here.
    fn matches(&self, inbound: &Self) -> bool {
        let same = |ours: &Option<SecretString>, theirs: &Option<SecretString>| match (ours, theirs) {
            (Some(a), Some(b)) => constant_time_eq(a.expose_secret(), b.expose_secret()),
            _ => false,
        };
        same(&self.access, &inbound.access) || same(&self.refresh, &inbound.refresh)
    }

    /// Cookie values for a credential pair, or empty when signed out.
    #[must_use]
    pub fn from_pair(pair: Option<&TokenPair>) -> Self {
        pair.map_or_else(Self::default, |pair| Self {
            access: Some(pair.access().clone()),
            refresh: Some(pair.refresh().clone()),
        })
    }

    /// A session exists at the edge when either cookie is present.
    #[must_use]
    pub const fn has_session(&self) -> bool {
        self.access.is_some() || self.refresh.is_some()
    }
}

/// Receiver of credential changes, readable before the store hydrates.
pub trait EdgeChannel: Send + Sync {
    /// Record the credentials the browser should now hold. `None` clears them.
    fn publish(&self, credentials: Option<&TokenPair>);

    /// Record a refreshed pair replacing the current one.
    fn rotate(&self, credentials: &TokenPair) {
        self.publish(Some(credentials));
    }

    /// Last known edge-visible credentials.
    fn peek(&self) -> CredentialCookies;
}

#[derive(Default)]
struct MirrorState {
    published: bool,
    values: CredentialCookies,
    /// Pair the current one was rotated from; its holder may upgrade.
    previous: CredentialCookies,
}

impl MirrorState {
    fn set(&mut self, next: CredentialCookies, rotated: bool) {
        self.published = true;
        if rotated && next.has_session() {
            self.previous = std::mem::replace(&mut self.values, next);
        } else {
            if !same_pair(&self.values, &next) {
                self.previous = CredentialCookies::default();
            }
            self.values = next;
        }
    }
}

fn same_pair(a: &CredentialCookies, b: &CredentialCookies) -> bool {
    let eq = |x: &Option<SecretString>, y: &Option<SecretString>| match (x, y) {
        (Some(x), Some(y)) => x.expose_secret() == y.expose_secret(),
        (None, None) => true,
        _ => false,
    };
    eq(&a.access, &b.access) && eq(&a.refresh, &b.refresh)
}

/// Compare secrets without short-circuiting on the first differing byte.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Response extension marking a response that signed its own browser in.
///
/// The cookie middleware sends the current credential pair to that browser
/// even though its request carried no matching cookies.
#[derive(Debug, Clone, Copy)]
pub struct CredentialGrant;

/// Process-wide cookie mirror.
pub struct CookieMirror {
    secure: bool,
    state: Mutex<MirrorState>,
}

impl std::fmt::Debug for CookieMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CookieMirror")
            .field("secure", &self.secure)
            .field("published", &state.published)
            .field("has_session", &state.values.has_session())
            .finish()
    }
}

impl CookieMirror {
    #[must_use]
    pub fn new(secure: bool) -> Self {
        Self {
            secure,
            state: Mutex::new(MirrorState::default()),
        }
    }

    #[must_use]
    pub const fn is_secure(&self) -> bool {
        self.secure
    }

    /// Remember cookies carried by an inbound request.
    ///
    /// Only used until the store publishes for the first time; afterwards
    /// the store is authoritative and browser values are ignored.
    pub fn observe(&self, inbound: &CredentialCookies) {
        let mut state = self.state.lock();
        if !state.published && inbound.has_session() {
            state.values = inbound.clone();
        }
    }

    /// The browser holding `inbound` owns the current session: one of its
    /// cookies matches the current pair, or the pair it was rotated from.
    #[must_use]
    pub fn recognizes(&self, inbound: &CredentialCookies) -> bool {
        let state = self.state.lock();
        state.values.matches(inbound) || state.previous.matches(inbound)
    }

    /// `Set-Cookie` values needed to bring a browser holding `inbound` in
    /// line with the mirror. Empty until the store has published.
    ///
    /// `granted` is set when this browser's own request issued the current
    /// pair. A browser neither granted nor recognized never receives
    /// credential values; its credential cookies are removed instead.
    #[must_use]
    pub fn reconcile(&self, inbound: &CredentialCookies, granted: bool) -> Vec<Cookie<'static>> {
        let state = self.state.lock();
        if !state.published {
            return Vec::new();
        }
        let entitled =
            granted || state.values.matches(inbound) || state.previous.matches(inbound);

        let mut out = Vec::new();
        for (name, want, have) in [
            (ACCESS_COOKIE, &state.values.access, &inbound.access),
            (REFRESH_COOKIE, &state.values.refresh, &inbound.refresh),
        ] {
            match (want, have) {
                (Some(want), Some(have)) if want.expose_secret() == have.expose_secret() => {}
                (Some(want), _) if entitled => out.push(self.cookie(name, want.expose_secret())),
                (_, Some(_)) => out.push(self.removal(name)),
                (_, None) => {}
            }
        }
        out
    }

    fn cookie(&self, name: &'static str, value: &str) -> Cookie<'static> {
        Cookie::build((name, value.to_owned()))
            .path("/")
            .max_age(Duration::days(COOKIE_MAX_AGE_DAYS))
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .http_only(false)
            .build()
    }

    fn removal(&self, name: &'static str) -> Cookie<'static> {
        let mut cookie = Cookie::build((name, ""))
            .path("/")
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .build();
        cookie.make_removal();
        cookie
    }
}

impl EdgeChannel for CookieMirror {
    fn publish(&self, credentials: Option<&TokenPair>) {
        self.state
            .lock()
            .set(CredentialCookies::from_pair(credentials), false);
    }

    fn rotate(&self, credentials: &TokenPair) {
        self.state
            .lock()
            .set(CredentialCookies::from_pair(Some(credentials)), true);
    }

    fn peek(&self) -> CredentialCookies {
        self.state.lock().values.clone()
    }
}

/// Read the credential cookies from request headers. Empty values count as
/// absent.
#[must_use]
pub fn read_request_cookies(headers: &HeaderMap) -> CredentialCookies {
    let mut found = CredentialCookies::default();

    for header in headers.get_all(COOKIE) {
        let Ok(raw) = header.to_str() else {
            continue;
        };
        for cookie in Cookie::split_parse(raw).flatten() {
            let value = cookie.value();
            if value.is_empty() {
                continue;
            }
            match cookie.name() {
                ACCESS_COOKIE => found.access = Some(SecretString::from(value.to_owned())),
                REFRESH_COOKIE => found.refresh = Some(SecretString::from(value.to_owned())),
                _ => {}
            }
        }
    }

    found
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(raw: &[&str]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for value in raw {
            map.append(COOKIE, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    fn inbound(access: Option<&str>, refresh: Option<&str>) -> CredentialCookies {
        CredentialCookies {
            access: access.map(|v| SecretString::from(v.to_owned())),
            refresh: refresh.map(|v| SecretString::from(v.to_owned())),
        }
    }

    #[test]
    fn test_read_request_cookies() {
        let found = read_request_cookies(&headers(&["theme=dark; accessToken=a1", "refreshToken=r1"]));
        assert_eq!(found.access.unwrap().expose_secret(), "a1");
        assert_eq!(found.refresh.unwrap().expose_secret(), "r1");

        let empty = read_request_cookies(&headers(&["accessToken=; other=1"]));
        assert!(!empty.has_session());
    }

    #[test]
    fn test_either_cookie_counts_as_session() {
        assert!(inbound(Some("a"), None).has_session());
        assert!(inbound(None, Some("r")).has_session());
        assert!(!inbound(None, None).has_session());
    }

    #[test]
    fn test_unpublished_mirror_leaves_browser_alone() {
        let mirror = CookieMirror::new(false);
        mirror.observe(&inbound(Some("a"), Some("r")));
        assert!(mirror.reconcile(&inbound(None, None), false).is_empty());
        assert_eq!(mirror.peek().access.unwrap().expose_secret(), "a");
    }

    #[test]
    fn test_publish_sets_cookie_attributes() {
        let mirror = CookieMirror::new(true);
        mirror.publish(Some(&TokenPair::new("a2", "r2")));

        let cookies = mirror.reconcile(&inbound(Some("a1"), Some("r2")), false);
        assert_eq!(cookies.len(), 1);
        let cookie = &cookies[0];
        assert_eq!(cookie.name(), ACCESS_COOKIE);
        assert_eq!(cookie.value(), "a2");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(Duration::days(7)));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.http_only(), Some(false));
    }

    #[test]
    fn test_publish_none_removes_cookies() {
        let mirror = CookieMirror::new(false);
        mirror.publish(None);

        let cookies = mirror.reconcile(&inbound(Some("a"), Some("r")), false);
        assert_eq!(cookies.len(), 2);
        assert!(cookies.iter().all(|c| c.value().is_empty()));
        assert!(cookies.iter().all(|c| c.max_age() == Some(Duration::ZERO)));

        assert!(mirror.reconcile(&inbound(None, None), false).is_empty());
    }

    #[test]
    fn test_observe_ignored_after_publish() {
        let mirror = CookieMirror::new(false);
        mirror.publish(None);
        mirror.observe(&inbound(Some("stale"), None));
        assert!(!mirror.peek().has_session());
    }

    #[test]
    fn test_anonymous_browser_gets_no_credentials() {
        let mirror = CookieMirror::new(false);
        mirror.publish(Some(&TokenPair::new("a1", "r1")));

        assert!(mirror.reconcile(&inbound(None, None), false).is_empty());
        assert!(!mirror.recognizes(&inbound(None, None)));
    }

    #[test]
    fn test_forged_cookies_are_removed() {
        let mirror = CookieMirror::new(false);
        mirror.publish(Some(&TokenPair::new("a1", "r1")));

        let forged = inbound(Some("forged"), None);
        assert!(!mirror.recognizes(&forged));
        let cookies = mirror.reconcile(&forged, false);
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].name(), ACCESS_COOKIE);
        assert_eq!(cookies[0].value(), "");
    }

    #[test]
    fn test_granted_browser_receives_pair() {
        let mirror = CookieMirror::new(false);
        mirror.publish(Some(&TokenPair::new("a1", "r1")));

        let cookies = mirror.reconcile(&inbound(None, None), true);
        let values: Vec<_> = cookies.iter().map(|c| (c.name(), c.value())).collect();
        assert_eq!(values, vec![(ACCESS_COOKIE, "a1"), (REFRESH_COOKIE, "r1")]);
    }

    #[test]
    fn test_rotation_upgrades_previous_holder_only() {
        let mirror = CookieMirror::new(false);
        mirror.publish(Some(&TokenPair::new("a1", "r1")));
        mirror.rotate(&TokenPair::new("a2", "r2"));

        let old = inbound(Some("a1"), Some("r1"));
        assert!(mirror.recognizes(&old));
        assert_eq!(mirror.reconcile(&old, false).len(), 2);

        // A fresh sign-in is not a rotation: the old holder loses access.
        mirror.publish(Some(&TokenPair::new("a3", "r3")));
        assert!(!mirror.recognizes(&inbound(Some("a2"), Some("r2"))));
        let cookies = mirror.reconcile(&inbound(Some("a2"), Some("r2")), false);
        assert!(cookies.iter().all(|c| c.value().is_empty()));
    }

    #[test]
    fn test_republishing_same_pair_keeps_previous() {
        let mirror = CookieMirror::new(false);
        mirror.publish(Some(&TokenPair::new("a1", "r1")));
        mirror.rotate(&TokenPair::new("a2", "r2"));
        // Storing the user record republishes the unchanged pair.
        mirror.publish(Some(&TokenPair::new("a2", "r2")));

        assert!(mirror.recognizes(&inbound(Some("a1"), None)));
    }
}
