//! Argon2id password hashing with per-user random salts.

use argon2::Argon2;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;

use crate::error::AuthError;

const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

/// Hash + salt pair, base64-encoded for TEXT column storage.
#[derive(Clone, Debug)]
pub struct HashedPassword {
    pub hash: String,
    pub salt: String,
}

/// Hash a password under a fresh random salt.
pub fn hash_password(password: &str) -> Result<HashedPassword, AuthError> {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);

    let mut hash = [0u8; HASH_LEN];
    Argon2::default()
        .hash_password_into(password.as_bytes(), &salt, &mut hash)
        .map_err(|e| AuthError::Hash(e.to_string()))?;

    Ok(HashedPassword {
        hash: BASE64.encode(hash),
        salt: BASE64.encode(salt),
    })
}

/// Check a password against stored material. `Ok(false)` is a mismatch;
/// an error means the stored material itself is unusable.
pub fn verify_password(
    password: &str,
    hash_b64: &str,
    salt_b64: &str,
) -> Result<bool, AuthError> {
    let salt = BASE64
        .decode(salt_b64)
        .map_err(|e| AuthError::Decode(e.to_string()))?;
    let expected = BASE64
        .decode(hash_b64)
        .map_err(|e| AuthError::Decode(e.to_string()))?;

    let mut actual = vec![0u8; expected.len()];
    Argon2::default()
        .hash_password_into(password.as_bytes(), &salt, &mut actual)
        .map_err(|e| AuthError::Hash(e.to_string()))?;

    Ok(actual == expected)
}
