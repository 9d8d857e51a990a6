//! Authenticated user record and role.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::UserId;

/// A user role as reported by the backend (`"ADMIN"`, `"admin"`, `"EDITOR"`...).
///
/// Roles are compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    /// Role required to use the admin screens unless configured otherwise.
    pub const DEFAULT_PRIVILEGED: &'static str = "ADMIN";

    /// Create a role from its name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the role name as given by the backend.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against a role name.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.0.trim().eq_ignore_ascii_case(name.trim())
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The currently authenticated user, fetched from `GET /v1/auth/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Backend user id.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Email address as stored by the backend.
    pub email: String,
    /// Role; absent for accounts the backend never assigned one.
    #[serde(default)]
    pub role: Option<Role>,
    /// Account creation time.
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    #[serde(default, alias = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserRecord {
    /// Returns `true` if the user holds the given (privileged) role.
    ///
    /// Users without a role never pass.
    #[must_use]
    pub fn has_role(&self, privileged: &str) -> bool {
        self.role.as_ref().is_some_and(|role| role.matches(privileged))
    }
}
