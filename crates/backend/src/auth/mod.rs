//! Authentication module for passwordless email sign-in.
//!
//! This module provides:
//! - Magic-link token generation and hashing
//! - JWT session tokens (and signed OAuth `state` values)
//! - `require_auth` middleware for protecting routes

mod handlers;
pub mod jwt;
pub mod magic_link;
mod middleware;
pub mod types;

pub use handlers::{auth_logout, auth_me, request_magic_link, verify_magic_link};
pub use middleware::{authenticate, build_auth_cookie, clear_auth_cookie, require_auth};
pub use types::{AuthConfig, AuthUser};
