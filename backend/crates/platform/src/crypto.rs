//! Random secret material

use base64::{Engine, engine::general_purpose};
use rand::{RngCore, rngs::OsRng};

/// Cryptographically secure random bytes.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Random secret of `len` bytes, URL-safe base64 without padding.
///
/// Used for per-process signing keys when none are configured.
pub fn random_secret(len: usize) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(random_bytes(len))
}
