//! PBKDF2-HMAC-SHA256 password hashing with a constant-time verify, plus
//! read-only interop with a legacy `<iter>:<salt>:<digest>` (HMAC-SHA1) format.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use hmac::Hmac;
use rand::RngCore;
use sha1::Sha1;
use sha2::Sha256;
use subtle::ConstantTimeEq;

const DEFAULT_ITERATIONS: u32 = 120_000;
const SALT_LEN: usize = 16;
const DIGEST_LEN: usize = 32;

#[derive(Debug)]
pub struct PasswordHashError;

/// Returns `pbkdf2$<iterations>$<saltBase64>$<digestBase64>`.
///
/// Fails only if `plain` is blank; callers are expected to have already
/// validated length bounds.
pub fn hash(plain: &str) -> Result<String, PasswordHashError> {
    if plain.is_empty() {
        return Err(PasswordHashError);
    }
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let mut digest = [0u8; DIGEST_LEN];
    pbkdf2::pbkdf2::<Hmac<Sha256>>(plain.as_bytes(), &salt, DEFAULT_ITERATIONS, &mut digest)
        .expect("HMAC can be initialized with any key length");

    Ok(format!(
        "pbkdf2${}${}${}",
        DEFAULT_ITERATIONS,
        B64.encode(salt),
        B64.encode(digest)
    ))
}

/// Verifies `plain` against `stored`, recognizing both the canonical
/// `pbkdf2$iter$salt$digest` form and the legacy `iter:salt:digest` form.
/// Any parse failure is treated as "no match" rather than propagated.
pub fn verify(plain: &str, stored: &str) -> bool {
    if let Some(rest) = stored.strip_prefix("pbkdf2$") {
        verify_canonical(plain, rest)
    } else if stored.contains(':') {
        verify_legacy(plain, stored)
    } else {
        false
    }
}

fn verify_canonical(plain: &str, rest: &str) -> bool {
    let mut parts = rest.splitn(3, '$');
    let (Some(iter_str), Some(salt_str), Some(digest_str)) =
        (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    let Ok(iterations) = iter_str.parse::<u32>() else {
        return false;
    };
    let Ok(salt) = B64.decode(salt_str) else {
        return false;
    };
    let Ok(expected) = B64.decode(digest_str) else {
        return false;
    };

    let mut actual = vec![0u8; expected.len().max(1)];
    if pbkdf2::pbkdf2::<Hmac<Sha256>>(plain.as_bytes(), &salt, iterations, &mut actual).is_err() {
        return false;
    }
    actual.ct_eq(&expected).into()
}

fn verify_legacy(plain: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(3, ':');
    let (Some(iter_str), Some(salt_str), Some(digest_str)) =
        (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    let Ok(iterations) = iter_str.parse::<u32>() else {
        return false;
    };
    let Ok(salt) = B64.decode(salt_str) else {
        return false;
    };
    let Ok(expected) = B64.decode(digest_str) else {
        return false;
    };

    let mut actual = vec![0u8; expected.len().max(1)];
    if pbkdf2::pbkdf2::<Hmac<Sha1>>(plain.as_bytes(), &salt, iterations, &mut actual).is_err() {
        return false;
    }
    actual.ct_eq(&expected).into()
}
