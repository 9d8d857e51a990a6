//! Core types for Folio.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod credential;
pub mod email;
pub mod forms;
pub mod id;
pub mod user;

pub use credential::{AccessClaims, TokenPair};
pub use email::{Email, EmailError};
pub use forms::{FieldError, FormErrors, LoginForm, RegisterForm, ValidLogin, ValidRegistration};
pub use id::{ResourceId, UserId};
pub use user::{Role, UserRecord};
