//! Hashing helpers shared by every crate: SHA-256, double SHA-256 and the
//! Base58Check rendering used for addresses on the CLI / API surface.
//!
//! Base58Check layout:
//!   payload ‖ sha256(sha256(payload))[0..4]  →  base58 alphabet

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Length of the checksum appended before Base58 encoding.
pub const CHECKSUM_LEN: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("base58 decode error: {0}")]
    Base58(String),

    #[error("payload too short: expected at least {expected} bytes, found {found}")]
    TooShort { expected: usize, found: usize },

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("hex decode error: {0}")]
    Hex(String),
}

/// sha256 raw bytes (32 bytes)
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// sha256(sha256(data))
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Encode payload with a 4-byte double-SHA-256 checksum into Base58.
pub fn base58check_encode(payload: &[u8]) -> String {
    let checksum = double_sha256(payload);
    let mut buf = Vec::with_capacity(payload.len() + CHECKSUM_LEN);
    buf.extend_from_slice(payload);
    buf.extend_from_slice(&checksum[..CHECKSUM_LEN]);
    bs58::encode(buf).into_string()
}

/// Decode a Base58Check string and verify its checksum. Returns the payload
/// without the checksum.
pub fn base58check_decode(s: &str) -> Result<Vec<u8>, CryptoError> {
    let raw = bs58::decode(s)
        .into_vec()
        .map_err(|e| CryptoError::Base58(e.to_string()))?;
    if raw.len() <= CHECKSUM_LEN {
        return Err(CryptoError::TooShort {
            expected: CHECKSUM_LEN + 1,
            found: raw.len(),
        });
    }
    let (payload, checksum) = raw.split_at(raw.len() - CHECKSUM_LEN);
    let expected = double_sha256(payload);
    if checksum != &expected[..CHECKSUM_LEN] {
        return Err(CryptoError::ChecksumMismatch);
    }
    Ok(payload.to_vec())
}

/// Decode a hex string (optional `0x` prefix).
pub fn decode_hex(s: &str) -> Result<Vec<u8>, CryptoError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(s).map_err(|e| CryptoError::Hex(e.to_string()))
}
