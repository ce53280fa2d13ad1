//! Outbound ports (driven side - SPI)

use crate::domain::{AuthorityId, Block, Header, OutputAndProof, PreDigest, Slot, VrfInput};
use crate::error::Result;
use async_trait::async_trait;
use primitive_types::H256;

/// Port: Read side of the block store (plus the import path used by callers
/// outside this subsystem)
///
/// Accesses are bounded and read-only from the point of view of the slot
/// clock, so the trait is synchronous.
pub trait BlockStore: Send + Sync {
    /// Hash of the best block
    fn best_block_hash(&self) -> Result<H256>;

    /// Header by hash
    fn header(&self, hash: &H256) -> Result<Header>;

    /// Arrival timestamp (milliseconds) recorded when the block was imported
    fn arrival_time(&self, hash: &H256) -> Result<u64>;

    /// Import a block together with its arrival timestamp
    fn add_block(&self, block: Block, arrival_time: u64) -> Result<()>;
}

/// Port: Local key capability used for slot claims
pub trait KeySource: Send + Sync {
    /// Public key of the authority key currently in use
    fn public_key(&self) -> Result<AuthorityId>;

    /// Evaluate the VRF over the slot transcript
    fn prove_vrf(&self, input: &VrfInput) -> Result<OutputAndProof>;
}

/// Port: Wall clock in milliseconds
pub trait WallClock: Send + Sync {
    /// Current time in milliseconds since the Unix epoch
    fn now_ms(&self) -> u64;
}

/// System time wall clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemWallClock;

impl WallClock for SystemWallClock {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default()
    }
}

/// Port: Fetch pending transactions from the transaction queue
#[async_trait]
pub trait TransactionSource: Send + Sync {
    /// Get up to `max_count` pending encoded transactions
    async fn pending_transactions(&self, max_count: u32) -> Result<Vec<Vec<u8>>>;
}

/// Request handed to the block assembly pipeline for a won slot
#[derive(Clone, Debug)]
pub struct BlockRequest {
    /// Header of the block to build on
    pub parent: Header,

    /// Won slot
    pub slot: Slot,

    /// Claim to embed in the header digest
    pub pre_digest: PreDigest,

    /// Transactions to include
    pub transactions: Vec<Vec<u8>>,
}

/// Port: Build a block for a won slot
#[async_trait]
pub trait BlockAssembler: Send + Sync {
    /// Assemble (and seal) a block from the request
    async fn assemble_block(&self, request: BlockRequest) -> Result<Block>;
}

/// Port: Hand an assembled block to the import/broadcast path
#[async_trait]
pub trait BlockBroadcaster: Send + Sync {
    /// Import the block locally and announce it to the network
    async fn broadcast_block(&self, block: Block) -> Result<()>;
}

/// Port: Publish events to Event Bus
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish generic event
    async fn publish_event(&self, topic: &str, payload: Vec<u8>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_after_2020() {
        // 2020-01-01T00:00:00Z
        assert!(SystemWallClock.now_ms() > 1_577_836_800_000);
    }
}
