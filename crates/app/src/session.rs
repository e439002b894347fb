//! Signed session cookies and password digests.
//!
//! The cookie carries `user_id-expires-digest`, where the digest is
//! `sha256("{id}-{passwd_digest}-{expires}-{secret}")` in hex. Verification
//! recomputes the digest from the stored password digest, so changing a
//! password invalidates outstanding cookies. Passwords themselves are stored
//! as `sha256("{id}:{plain}")` hex.

use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};

pub const COOKIE_NAME: &str = "weblogsession";

/// Session lifetime in seconds.
pub const COOKIE_MAX_AGE: u64 = 86400;

pub fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default()
}

fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// The digest stored in the `passwd` column.
pub fn password_digest(user_id: &str, plain: &str) -> String {
    sha256_hex(&format!("{user_id}:{plain}"))
}

fn cookie_digest(user_id: &str, passwd_digest: &str, expires: u64, secret: &str) -> String {
    sha256_hex(&format!("{user_id}-{passwd_digest}-{expires}-{secret}"))
}

/// Builds the full cookie value for a user session expiring at `expires`.
pub fn sign_cookie(user_id: &str, passwd_digest: &str, expires: u64, secret: &str) -> String {
    format!("{user_id}-{expires}-{}", cookie_digest(user_id, passwd_digest, expires, secret))
}

/// Splits a cookie into `(user_id, expires, digest)`. Malformed cookies
/// yield `None`.
pub fn split_cookie(cookie: &str) -> Option<(&str, u64, &str)> {
    let mut parts = cookie.split('-');
    let user_id = parts.next()?;
    let expires = parts.next()?.parse().ok()?;
    let digest = parts.next()?;
    if parts.next().is_some() || user_id.is_empty() || digest.is_empty() {
        return None;
    }
    Some((user_id, expires, digest))
}

/// Constant-shape check of a presented digest against a recomputation.
pub fn digest_matches(user_id: &str, passwd_digest: &str, expires: u64, secret: &str, digest: &str) -> bool {
    cookie_digest(user_id, passwd_digest, expires, secret) == digest
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn cookie_round_trips() {
        let passwd = password_digest("u1", "hunter2");
        let expires = now_secs() + COOKIE_MAX_AGE;
        let cookie = sign_cookie("u1", &passwd, expires, SECRET);

        let (user_id, parsed_expires, digest) = split_cookie(&cookie).unwrap();
        assert_eq!(user_id, "u1");
        assert_eq!(parsed_expires, expires);
        assert!(digest_matches(user_id, &passwd, parsed_expires, SECRET, digest));
    }

    #[test]
    fn tampered_digest_fails() {
        let passwd = password_digest("u1", "hunter2");
        let expires = now_secs() + COOKIE_MAX_AGE;
        assert!(!digest_matches("u1", &passwd, expires, SECRET, "0000"));
    }

    #[test]
    fn changed_password_invalidates_cookie() {
        let expires = now_secs() + COOKIE_MAX_AGE;
        let cookie = sign_cookie("u1", &password_digest("u1", "old"), expires, SECRET);
        let (user_id, parsed_expires, digest) = split_cookie(&cookie).unwrap();
        assert!(!digest_matches(user_id, &password_digest("u1", "new"), parsed_expires, SECRET, digest));
    }

    #[test]
    fn malformed_cookies_are_rejected() {
        assert!(split_cookie("").is_none());
        assert!(split_cookie("justonepart").is_none());
        assert!(split_cookie("a-b-c").is_none()); // expires not numeric
        assert!(split_cookie("a-123-d-extra").is_none());
        assert!(split_cookie("-123-d").is_none());
    }

    #[test]
    fn password_digest_depends_on_user_id() {
        assert_ne!(password_digest("u1", "pw"), password_digest("u2", "pw"));
    }
}
