//! Utility modules for slot production

pub mod hashing;

pub use hashing::{header_hash, output_to_u512, serialize_header, sha256};
