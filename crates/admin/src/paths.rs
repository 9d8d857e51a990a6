//! Well-known page paths.

/// Public landing page; non-privileged users are sent here.
pub const HOME: &str = "/";

/// Login and signup page.
pub const LOGIN: &str = "/auth";

/// Root of the protected dashboard area.
pub const DASHBOARD: &str = "/dashboard";

/// Dashboard logout action.
pub const LOGOUT: &str = "/dashboard/logout";

/// Path of a resource listing page.
#[must_use]
pub fn resource(slug: &str) -> String {
    format!("{DASHBOARD}/{slug}")
}
