//! Adapters for the outbound ports
//!
//! - [`InMemoryBlockStore`]: reference block store
//! - [`LocalKeystore`] / [`SlotKey`]: sr25519 keys backing the slot lottery

pub mod keystore;
pub mod memory_store;

pub use keystore::{CryptoScheme, KeyType, LocalKeystore, SlotKey};
pub use memory_store::InMemoryBlockStore;
