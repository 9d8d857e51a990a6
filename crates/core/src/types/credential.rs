//! Bearer credential types.
//!
//! The backend issues an opaque access/refresh token pair. Both are held as
//! [`SecretString`] so they never end up in logs through `Debug`.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Access and refresh credential pair.
///
/// Owned by the session store. Copies of it are mirrored into cookies and
/// durable storage, but those copies are never the source of truth.
#[derive(Debug, Clone)]
pub struct TokenPair {
    access: SecretString,
    refresh: SecretString,
}

impl TokenPair {
    /// Create a credential pair from raw token strings.
    #[must_use]
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: SecretString::from(access.into()),
            refresh: SecretString::from(refresh.into()),
        }
    }

    /// The short-lived bearer token attached to API calls.
    #[must_use]
    pub const fn access(&self) -> &SecretString {
        &self.access
    }

    /// The long-lived token exchanged for a new pair.
    #[must_use]
    pub const fn refresh(&self) -> &SecretString {
        &self.refresh
    }

    /// Returns `true` if both pairs carry the same tokens.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        self.access.expose_secret() == other.access.expose_secret()
            && self.refresh.expose_secret() == other.refresh.expose_secret()
    }

    /// Best-effort, unverified decode of the access token's claims.
    #[must_use]
    pub fn access_claims(&self) -> Option<AccessClaims> {
        AccessClaims::decode_unverified(self.access.expose_secret())
    }
}

/// Claims carried by a JWT-shaped access token.
///
/// Decoded without signature verification: the dashboard only uses them for
/// display, the backend remains the authority on validity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccessClaims {
    /// Subject (user id).
    #[serde(default)]
    pub sub: Option<String>,
    /// Email of the subject.
    #[serde(default)]
    pub email: Option<String>,
    /// Expiry as a Unix timestamp.
    pub exp: i64,
    /// Issued-at as a Unix timestamp.
    #[serde(default)]
    pub iat: Option<i64>,
}

impl AccessClaims {
    /// Decode the payload segment of a `header.payload.signature` token.
    ///
    /// Returns `None` for anything that is not a three-segment token with a
    /// base64url JSON payload containing `exp`.
    #[must_use]
    pub fn decode_unverified(token: &str) -> Option<Self> {
        let mut segments = token.split('.');
        let (Some(_header), Some(payload), Some(_signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return None;
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Expiry as a timestamp.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    /// Check if the token has expired at the given instant.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn jwt_with_payload(payload: &str) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let pair = TokenPair::new("access-value", "refresh-value");
        let debug = format!("{pair:?}");
        assert!(!debug.contains("access-value"));
        assert!(!debug.contains("refresh-value"));
    }

    #[test]
    fn test_same_as() {
        let a = TokenPair::new("a", "r");
        assert!(a.same_as(&TokenPair::new("a", "r")));
        assert!(!a.same_as(&TokenPair::new("a", "r2")));
        assert!(!a.same_as(&TokenPair::new("a2", "r")));
    }

    #[test]
    fn test_decode_claims() {
        let token = jwt_with_payload(
            r#"{"sub":"user-1","email":"me@example.com","exp":1700000000,"iat":1699990000}"#,
        );
        let claims = AccessClaims::decode_unverified(&token).unwrap();
        assert_eq!(claims.sub.as_deref(), Some("user-1"));
        assert_eq!(claims.email.as_deref(), Some("me@example.com"));
        assert_eq!(claims.exp, 1_700_000_000);
        assert_eq!(claims.iat, Some(1_699_990_000));
        assert_eq!(claims.expires_at().unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_decode_rejects_opaque_tokens() {
        assert!(AccessClaims::decode_unverified("opaque-token").is_none());
        assert!(AccessClaims::decode_unverified("a.b").is_none());
        assert!(AccessClaims::decode_unverified("a.b.c.d").is_none());
        assert!(AccessClaims::decode_unverified("a.!!!.c").is_none());
        // Valid base64 but no exp claim
        assert!(AccessClaims::decode_unverified(&jwt_with_payload(r#"{"sub":"x"}"#)).is_none());
    }

    #[test]
    fn test_is_expired_at() {
        let claims = AccessClaims {
            sub: None,
            email: None,
            exp: 1_000,
            iat: None,
        };
        assert!(!claims.is_expired_at(DateTime::from_timestamp(999, 0).unwrap()));
        assert!(claims.is_expired_at(DateTime::from_timestamp(1_000, 0).unwrap()));
    }

    #[test]
    fn test_pair_access_claims() {
        let pair = TokenPair::new(jwt_with_payload(r#"{"exp":42}"#), "refresh");
        assert_eq!(pair.access_claims().unwrap().exp, 42);
        assert!(TokenPair::new("opaque", "refresh").access_claims().is_none());
    }
}
