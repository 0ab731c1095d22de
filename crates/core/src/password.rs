//! Salted one-way password hashing.
//!
//! Credentials are stored as a per-user random salt plus the SHA-512 digest of
//! `password ++ salt`, both hex-encoded. The plaintext never leaves this
//! module's call frame.

use rand::RngCore;
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;

/// Salt byte length before hex encoding (16 bytes = 32 hex chars).
pub const SALT_BYTES: usize = 16;

/// Hex-encoded length of a SHA-512 digest.
pub const DIGEST_CHARS: usize = 128;

/// A freshly derived salt/digest pair, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash {
    /// Random hex salt, fixed width.
    pub salt: String,
    /// Hex SHA-512 digest of `password ++ salt`.
    pub digest: String,
}

/// Hash a password with a fresh random salt.
///
/// Every call draws a new salt from the OS RNG, so hashing the same password
/// twice yields two distinct, independently verifiable pairs.
pub fn hash_password(password: &str) -> PasswordHash {
    let mut bytes = [0u8; SALT_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let salt = hex::encode(bytes);
    let digest = digest_for(password, &salt);
    PasswordHash { salt, digest }
}

/// Verify a plaintext password against a stored salt/digest pair.
///
/// The comparison is constant time with respect to mismatch position.
pub fn verify_password(password: &str, salt: &str, digest: &str) -> bool {
    let computed = digest_for(password, salt);
    computed.as_bytes().ct_eq(digest.as_bytes()).into()
}

fn digest_for(password: &str, salt: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}
