//! In-memory block store
//!
//! Reference [`BlockStore`] used by tests and by embedders that do not have
//! a persistent store wired in yet. Best block is the highest block number
//! seen; the first block imported at a height wins ties.

use crate::domain::{Block, Header};
use crate::error::{Result, SlotProductionError};
use crate::ports::BlockStore;
use parking_lot::RwLock;
use primitive_types::H256;
use std::collections::HashMap;
use tracing::debug;

struct StoredBlock {
    block: Block,
    arrival_time: u64,
}

struct StoreInner {
    blocks: HashMap<H256, StoredBlock>,
    best: H256,
    best_number: u64,
}

/// Block store kept entirely in memory
pub struct InMemoryBlockStore {
    inner: RwLock<StoreInner>,
}

impl InMemoryBlockStore {
    /// Create a store holding only the genesis block
    pub fn new(genesis: Header, genesis_arrival: u64) -> Self {
        let hash = genesis.hash();
        let number = genesis.number;
        let mut blocks = HashMap::new();
        blocks.insert(
            hash,
            StoredBlock {
                block: Block {
                    header: genesis,
                    body: Vec::new(),
                },
                arrival_time: genesis_arrival,
            },
        );

        Self {
            inner: RwLock::new(StoreInner {
                blocks,
                best: hash,
                best_number: number,
            }),
        }
    }

    /// Create a store with the default genesis header
    pub fn with_genesis(genesis_arrival: u64) -> Self {
        Self::new(Header::genesis(), genesis_arrival)
    }

    /// Full block by hash
    pub fn block(&self, hash: &H256) -> Option<Block> {
        self.inner
            .read()
            .blocks
            .get(hash)
            .map(|stored| stored.block.clone())
    }

    /// Number of stored blocks, genesis included
    pub fn len(&self) -> usize {
        self.inner.read().blocks.len()
    }

    /// True if the store holds no blocks
    pub fn is_empty(&self) -> bool {
        self.inner.read().blocks.is_empty()
    }
}

impl BlockStore for InMemoryBlockStore {
    fn best_block_hash(&self) -> Result<H256> {
        Ok(self.inner.read().best)
    }

    fn header(&self, hash: &H256) -> Result<Header> {
        self.inner
            .read()
            .blocks
            .get(hash)
            .map(|stored| stored.block.header.clone())
            .ok_or(SlotProductionError::UnknownBlock(*hash))
    }

    fn arrival_time(&self, hash: &H256) -> Result<u64> {
        self.inner
            .read()
            .blocks
            .get(hash)
            .map(|stored| stored.arrival_time)
            .ok_or(SlotProductionError::UnknownBlock(*hash))
    }

    fn add_block(&self, block: Block, arrival_time: u64) -> Result<()> {
        let hash = block.hash();
        let number = block.header.number;
        let mut inner = self.inner.write();

        if !inner.blocks.contains_key(&block.header.parent_hash) {
            return Err(SlotProductionError::UnknownBlock(block.header.parent_hash));
        }
        if inner.blocks.contains_key(&hash) {
            return Err(SlotProductionError::StoreError(format!(
                "block {hash:?} already imported"
            )));
        }

        inner.blocks.insert(
            hash,
            StoredBlock {
                block,
                arrival_time,
            },
        );
        if number > inner.best_number {
            inner.best = hash;
            inner.best_number = number;
        }

        debug!(
            "[qc-17] Stored block #{} {:?} (arrival {} ms)",
            number, hash, arrival_time
        );
        Ok(())
    }
}
