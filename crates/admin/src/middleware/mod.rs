//! HTTP middleware stack for the dashboard.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (added in `main`)
//! 2. `TraceLayer` (added in `main`)
//! 3. Request ID
//! 4. Security headers
//! 5. Cookie mirror sync
//! 6. Pending navigation (forced logout redirects)
//! 7. Edge filter (cookie-only routing)
//! 8. Route guard (dashboard routes only)

pub mod cookie_mirror;
pub mod edge;
pub mod guard;
pub mod navigation;
pub mod request_id;
pub mod security_headers;

pub use cookie_mirror::sync_cookies;
pub use edge::{EdgeAction, edge_filter};
pub use guard::{CurrentAdmin, GuardDecision, GuardWatch, require_admin};
pub use navigation::pending_navigation;
pub use request_id::request_id;
pub use security_headers::security_headers;
