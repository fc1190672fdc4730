//! Random identifiers for sandbox users, passwords and databases.
//!
//! Identifiers are 7 bytes from the OS's cryptographically secure RNG,
//! encoded as unpadded lowercase base32. The output only contains
//! `a-z` and `2-7`, so it can be interpolated into quoted identifier and
//! string positions of `CREATE USER` / `CREATE DATABASE` without escaping.

use rand::rngs::OsRng;
use rand::TryRngCore;

use crate::error::SandboxError;

/// Namespace tag for generated database names. Orphans left behind by a
/// failed run can be found with `SHOW DATABASES LIKE 'dbsandbox\_%'`.
pub const DATABASE_PREFIX: &str = "dbsandbox_";

const ENTROPY_BYTES: usize = 7;

/// RFC 4648 base32 alphabet, lowercased.
const BASE32: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";

/// Length of every identifier produced by [`random_suffix`].
pub const SUFFIX_LEN: usize = (ENTROPY_BYTES * 8).div_ceil(5);

/// Generate one random identifier.
///
/// Fails only when the OS entropy source cannot be read, which is not a
/// transient condition and is never retried.
pub fn random_suffix() -> Result<String, SandboxError> {
    let mut bytes = [0u8; ENTROPY_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| SandboxError::Entropy {
            detail: e.to_string(),
        })?;
    Ok(encode_base32(&bytes))
}

/// Generate a database name: [`DATABASE_PREFIX`] plus a random suffix.
pub fn random_database_name() -> Result<String, SandboxError> {
    Ok(format!("{DATABASE_PREFIX}{}", random_suffix()?))
}

fn encode_base32(bytes: &[u8]) -> String {
    let mut out = String::with_capacity((bytes.len() * 8).div_ceil(5));
    let mut buffer: u16 = 0;
    let mut bits: u32 = 0;

    for &b in bytes {
        buffer = (buffer << 8) | u16::from(b);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(BASE32[usize::from((buffer >> bits) & 0x1f)] as char);
        }
    }
    if bits > 0 {
        out.push(BASE32[usize::from((buffer << (5 - bits)) & 0x1f)] as char);
    }
    out
}
