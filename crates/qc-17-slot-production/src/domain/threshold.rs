//! Epoch threshold management
//!
//! Each authority wins a slot when its VRF output (a 256-bit big-endian
//! integer) is below the epoch threshold. With `n` authorities each
//! winning independently with probability `p`, the chance that at least
//! one wins is `1 - (1 - p)^n`. Solving for the configured target rate `c`
//! gives `p = 1 - (1 - c)^(1/n)`, and the threshold is `p * 2^256`.
//!
//! The threshold and the rest of the epoch data are replaced as a whole at
//! epoch boundaries; readers hold an `Arc` to an immutable snapshot.

use super::entities::{AuthorityId, AuthorityIndex};
use crate::config::TargetRate;
use crate::error::{Result, SlotProductionError};
use crate::utils::hashing::output_to_u512;
use parking_lot::RwLock;
use primitive_types::U512;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Cutoff a VRF output must fall under to win a slot
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct EpochThreshold(U512);

impl EpochThreshold {
    /// Threshold exceeding every possible 256-bit output (`2^256`)
    pub fn always_win() -> Self {
        Self(U512::one() << 256)
    }

    /// Threshold no output falls under
    pub fn never_win() -> Self {
        Self(U512::zero())
    }

    /// Wrap a raw value
    pub fn from_raw(value: U512) -> Self {
        Self(value)
    }

    /// Raw value
    pub fn value(&self) -> U512 {
        self.0
    }

    /// True if `output` (big-endian) is strictly below the threshold
    pub fn is_winning(&self, output: &[u8; 32]) -> bool {
        output_to_u512(output) < self.0
    }

    /// Approximate per-authority win probability
    pub fn probability(&self) -> f64 {
        let scaled = (self.0 >> 192).low_u128();
        scaled as f64 / 2f64.powi(64)
    }
}

impl fmt::Debug for EpochThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EpochThreshold(p~{:.6})", self.probability())
    }
}

/// Threshold giving a network-wide win probability of `target_rate` with
/// `authority_count` equally weighted authorities
pub fn calculate_threshold(
    target_rate: TargetRate,
    authority_count: usize,
) -> Result<EpochThreshold> {
    target_rate.validate()?;
    if authority_count == 0 {
        return Err(SlotProductionError::EmptyAuthoritySet);
    }

    let c = target_rate.as_f64();
    let p = -f64::exp_m1(f64::ln_1p(-c) / authority_count as f64);
    let p = p.clamp(0.0, 1.0);

    // 64 bits of precision shifted into the top of the 256-bit range
    let scaled = (p * 2f64.powi(64)).floor() as u128;
    Ok(EpochThreshold(U512::from(scaled) << 192))
}

/// Immutable per-epoch data
#[derive(Clone, Debug)]
pub struct EpochData {
    /// Epoch index
    pub epoch_index: u64,

    /// Public randomness mixed into every VRF transcript of the epoch
    pub randomness: [u8; 32],

    /// Ordered authority set
    pub authorities: Vec<AuthorityId>,

    /// Win threshold
    pub threshold: EpochThreshold,
}

impl EpochData {
    /// Position of `public_key` in the authority set
    pub fn authority_index(&self, public_key: &AuthorityId) -> Option<AuthorityIndex> {
        self.authorities
            .iter()
            .position(|authority| authority == public_key)
            .map(|index| index as AuthorityIndex)
    }
}

/// Holds the active epoch data and recomputes the threshold at epoch
/// boundaries
pub struct ThresholdManager {
    target_rate: TargetRate,
    current: RwLock<Option<Arc<EpochData>>>,
}

impl ThresholdManager {
    /// Create a manager with no active epoch
    pub fn new(target_rate: TargetRate) -> Result<Self> {
        target_rate.validate()?;
        Ok(Self {
            target_rate,
            current: RwLock::new(None),
        })
    }

    /// Configured target rate
    pub fn target_rate(&self) -> TargetRate {
        self.target_rate
    }

    /// Start a new epoch: compute its threshold and replace the active data
    pub fn begin_epoch(
        &self,
        epoch_index: u64,
        randomness: [u8; 32],
        authorities: Vec<AuthorityId>,
    ) -> Result<Arc<EpochData>> {
        let threshold = calculate_threshold(self.target_rate, authorities.len())?;
        self.install(EpochData {
            epoch_index,
            randomness,
            authorities,
            threshold,
        })
    }

    /// Start a new epoch with a fixed threshold
    pub fn force_threshold(
        &self,
        epoch_index: u64,
        randomness: [u8; 32],
        authorities: Vec<AuthorityId>,
        threshold: EpochThreshold,
    ) -> Result<Arc<EpochData>> {
        if authorities.is_empty() {
            return Err(SlotProductionError::EmptyAuthoritySet);
        }
        self.install(EpochData {
            epoch_index,
            randomness,
            authorities,
            threshold,
        })
    }

    fn install(&self, data: EpochData) -> Result<Arc<EpochData>> {
        info!(
            "[qc-17] Epoch {} begins: {} authorities, threshold {:?}",
            data.epoch_index,
            data.authorities.len(),
            data.threshold
        );
        let data = Arc::new(data);
        *self.current.write() = Some(Arc::clone(&data));
        Ok(data)
    }

    /// Active epoch data
    pub fn current(&self) -> Result<Arc<EpochData>> {
        self.current
            .read()
            .clone()
            .ok_or(SlotProductionError::ThresholdUnset)
    }
}
