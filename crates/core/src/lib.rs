//! Folio Core - Shared types library.
//!
//! This crate provides the domain types used by the Folio admin dashboard:
//! - `admin` - Dashboard server, session store and authenticated API pipeline
//! - `integration-tests` - End-to-end tests against a fake backend
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no HTTP
//! clients, no storage. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Credentials, users, roles, emails, ids and form validation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
