//! SHA-256 digests used to gate database refreshes.

use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Length of a hex encoded SHA-256 digest.
pub const CHECKSUM_HEX_LEN: usize = 64;

/// Upper-case hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:X}", Sha256::digest(data))
}

/// Extract the digest from a `sha256sum`-style response body.
///
/// Only the first 64 characters are used; the file name that usually
/// follows is ignored.
pub fn parse_remote_checksum(body: &str) -> Result<String> {
    let digest = body
        .get(..CHECKSUM_HEX_LEN)
        .ok_or_else(|| Error::InvalidChecksum(format!("too short: {:?}", body.trim())))?;

    if !digest.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::InvalidChecksum(digest.to_string()));
    }

    Ok(digest.to_ascii_uppercase())
}

/// Case-insensitive digest comparison.
pub fn checksum_eq(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}
