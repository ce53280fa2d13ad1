//! Configuration types for slot production

use crate::error::{Result, SlotProductionError};
use serde::Deserialize;

/// Runtime configuration for slot production
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SlotProductionConfig {
    /// Slot duration in milliseconds (network-wide constant)
    pub slot_duration_ms: u64,

    /// Number of consecutive slots sharing one authority set and threshold
    pub epoch_length: u64,

    /// Target fraction of slots that should have a producer network-wide
    pub target_rate: TargetRate,

    /// Number of recent best-chain blocks used by the slot clock
    pub slot_lookback: u64,

    /// Maximum pending transactions requested per produced block
    pub max_block_transactions: u32,

    /// Keep lottery results for this many slots behind the current one
    /// (None = never prune)
    pub proof_cache_retention: Option<u64>,
}

impl Default for SlotProductionConfig {
    fn default() -> Self {
        Self {
            slot_duration_ms: crate::DEFAULT_SLOT_DURATION_MS,
            epoch_length: crate::DEFAULT_EPOCH_LENGTH,
            target_rate: TargetRate::default(),
            slot_lookback: crate::DEFAULT_SLOT_LOOKBACK,
            max_block_transactions: crate::MAX_BLOCK_TRANSACTIONS,
            proof_cache_retention: None,
        }
    }
}

impl SlotProductionConfig {
    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.slot_duration_ms == 0 {
            return Err(SlotProductionError::InvalidConfig(
                "slot_duration_ms must be non-zero".to_string(),
            ));
        }
        if self.epoch_length == 0 {
            return Err(SlotProductionError::InvalidConfig(
                "epoch_length must be non-zero".to_string(),
            ));
        }
        if self.slot_lookback == 0 {
            return Err(SlotProductionError::InvalidConfig(
                "slot_lookback must be non-zero".to_string(),
            ));
        }
        if self.proof_cache_retention == Some(0) {
            return Err(SlotProductionError::InvalidConfig(
                "proof_cache_retention must be non-zero when set".to_string(),
            ));
        }
        self.target_rate.validate()
    }

    /// Epoch index a slot belongs to
    pub fn epoch_of(&self, slot: u64) -> u64 {
        slot / self.epoch_length
    }
}

/// Network-wide probability that a slot has at least one winner, as a ratio
#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct TargetRate {
    /// Ratio numerator
    pub numerator: u64,
    /// Ratio denominator
    pub denominator: u64,
}

impl Default for TargetRate {
    fn default() -> Self {
        Self {
            numerator: 1,
            denominator: 4,
        }
    }
}

impl TargetRate {
    /// Every slot has a producer
    pub const ALWAYS: TargetRate = TargetRate {
        numerator: 1,
        denominator: 1,
    };

    /// Create a new rate
    pub fn new(numerator: u64, denominator: u64) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Rate must lie in (0, 1]
    pub fn validate(&self) -> Result<()> {
        if self.denominator == 0 || self.numerator == 0 || self.numerator > self.denominator {
            return Err(SlotProductionError::InvalidConfig(format!(
                "target rate {}/{} must lie in (0, 1]",
                self.numerator, self.denominator
            )));
        }
        Ok(())
    }

    /// Rate as a float
    pub fn as_f64(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}
