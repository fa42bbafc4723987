//! Single-use sign-in tokens delivered by email.
//!
//! Only the SHA-256 hash of a token is stored; the raw token exists in the
//! emailed link alone.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Generate a fresh random token (64 hex chars, from two v4 UUIDs).
pub fn generate_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Canonical form used for lookups: trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn verification_url(app_url: &str, token: &str, email: &str) -> String {
    format!(
        "{}/api/auth/verify?token={}&email={}",
        app_url,
        urlencoding::encode(token),
        urlencoding::encode(email)
    )
}
