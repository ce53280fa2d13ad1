//! Hashing utilities for slot production
//!
//! Provides the canonical header serialization and the hash used to
//! identify blocks in the store.

use crate::domain::Header;
use primitive_types::{H256, U256, U512};
use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of data
#[inline]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Convert VRF output bytes to U512 (big-endian)
#[inline]
pub fn output_to_u512(bytes: &[u8; 32]) -> U512 {
    U512::from(U256::from_big_endian(bytes))
}

/// Serialize block header for hashing
///
/// Fixed little-endian layout: parent hash, number, digest count, then each
/// digest item as tag, u32 length, payload.
pub fn serialize_header(header: &Header) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(64 + header.digest.len() * 128);

    bytes.extend_from_slice(header.parent_hash.as_bytes());
    bytes.extend_from_slice(&header.number.to_le_bytes());
    bytes.extend_from_slice(&(header.digest.len() as u32).to_le_bytes());
    for item in &header.digest {
        bytes.extend_from_slice(&item.to_bytes());
    }

    bytes
}

/// Compute header hash
pub fn header_hash(header: &Header) -> H256 {
    H256::from(sha256(&serialize_header(header)))
}
