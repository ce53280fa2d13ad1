//! Metrics collection for slot production

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics collector for slot production
#[derive(Debug, Default)]
pub struct Metrics {
    /// Lottery evaluations that ran the VRF
    pub slots_evaluated: AtomicU64,

    /// Slots won by the local authority
    pub slots_won: AtomicU64,

    /// Slots skipped because of a recoverable failure
    pub slots_skipped: AtomicU64,

    /// Lottery calls answered from the proof cache
    pub cache_hits: AtomicU64,

    /// Blocks assembled and handed to the broadcaster
    pub blocks_produced: AtomicU64,

    /// Transactions included in produced blocks
    pub transactions_included: AtomicU64,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a VRF evaluation and whether it won
    pub fn record_evaluation(&self, won: bool) {
        self.slots_evaluated.fetch_add(1, Ordering::Relaxed);
        if won {
            self.slots_won.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a cache hit
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a skipped slot
    pub fn record_skipped(&self) {
        self.slots_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a produced block
    pub fn record_block_produced(&self, tx_count: usize) {
        self.blocks_produced.fetch_add(1, Ordering::Relaxed);
        self.transactions_included
            .fetch_add(tx_count as u64, Ordering::Relaxed);
    }

    /// Get slots evaluated
    pub fn get_slots_evaluated(&self) -> u64 {
        self.slots_evaluated.load(Ordering::Relaxed)
    }

    /// Get slots won
    pub fn get_slots_won(&self) -> u64 {
        self.slots_won.load(Ordering::Relaxed)
    }

    /// Get slots skipped
    pub fn get_slots_skipped(&self) -> u64 {
        self.slots_skipped.load(Ordering::Relaxed)
    }

    /// Get cache hits
    pub fn get_cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// Get blocks produced
    pub fn get_blocks_produced(&self) -> u64 {
        self.blocks_produced.load(Ordering::Relaxed)
    }

    /// Observed fraction of evaluated slots that were won
    pub fn get_win_rate(&self) -> f64 {
        let evaluated = self.slots_evaluated.load(Ordering::Relaxed);
        if evaluated == 0 {
            return 0.0;
        }
        self.slots_won.load(Ordering::Relaxed) as f64 / evaluated as f64
    }

    /// Get average transactions per block
    pub fn get_avg_transactions_per_block(&self) -> f64 {
        let blocks = self.blocks_produced.load(Ordering::Relaxed);
        if blocks == 0 {
            return 0.0;
        }
        let txs = self.transactions_included.load(Ordering::Relaxed);
        txs as f64 / blocks as f64
    }
}
