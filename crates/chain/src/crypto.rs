//! crypto helpers for the chain core: sha3-256 digests used for ids and
//! deterministic ordering. Signature checking lives outside this crate.
use hex::encode as hex_encode;
use sha3::{Digest, Sha3_256};

use crate::types::{Address, Hash, ADDRESS_LEN};

/// compute sha3-256 raw bytes
pub fn sha3_256_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// compute sha3-256 as Hash
pub fn sha3_256(data: &[u8]) -> Hash {
    Hash(sha3_256_bytes(data))
}

/// compute sha3-256 hex string of bytes
pub fn sha3_256_hex(data: &[u8]) -> String {
    hex_encode(sha3_256_bytes(data))
}

/// Contract address = last 20 bytes of sha3-256(tx_id ‖ owner).
pub fn contract_address(tx_id: &Hash, owner: &Address) -> Address {
    let mut buf = Vec::with_capacity(32 + ADDRESS_LEN);
    buf.extend_from_slice(tx_id.as_bytes());
    buf.extend_from_slice(owner.as_bytes());
    let digest = sha3_256_bytes(&buf);
    let mut out = [0u8; ADDRESS_LEN];
    out.copy_from_slice(&digest[32 - ADDRESS_LEN..]);
    Address(out)
}

/// Tie-break key for witnesses with equal vote count.
pub fn address_tiebreak_hash(addr: &Address) -> [u8; 32] {
    sha3_256_bytes(addr.as_bytes())
}
