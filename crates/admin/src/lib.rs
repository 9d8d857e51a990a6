//! Folio admin dashboard library.
//!
//! Server-rendered dashboard for the Folio portfolio CMS. Every backend call
//! goes through the authenticated request pipeline in [`api`], which attaches
//! the bearer token, refreshes it once on 401 and replays the failed requests.
//!
//! # Security
//!
//! This crate holds the signed-in administrator's tokens:
//! - Credentials persisted to a local session file (mode 0600)
//! - Mirrored to browser cookies for the edge filter
//!
//! Bind to loopback unless a TLS-terminating proxy sits in front.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod error;
pub mod middleware;
pub mod notify;
pub mod paths;
pub mod routes;
pub mod session;
pub mod state;
