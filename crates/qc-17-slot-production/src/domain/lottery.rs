//! Slot lottery and proof cache
//!
//! The first evaluation of a slot is authoritative: its result (win or
//! loss) is cached and every later call for the same slot returns it
//! without touching the key. Failed evaluations leave no entry behind.

use super::entities::{AuthorityIndex, OutputAndProof, Slot, VrfInput};
use super::pre_digest::PreDigest;
use super::threshold::ThresholdManager;
use crate::error::{Result, SlotProductionError};
use crate::metrics::Metrics;
use crate::ports::KeySource;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Winning proof with the authority index of the epoch it was proven in
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct SlotClaim {
    claim: OutputAndProof,
    authority_index: AuthorityIndex,
}

/// Runs the per-slot VRF lottery for the local authority
pub struct LotteryEngine {
    key: Arc<dyn KeySource>,
    thresholds: Arc<ThresholdManager>,
    cache: Mutex<BTreeMap<u64, Option<SlotClaim>>>,
    metrics: Arc<Metrics>,
}

impl LotteryEngine {
    /// Create an engine with an empty cache
    pub fn new(
        key: Arc<dyn KeySource>,
        thresholds: Arc<ThresholdManager>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            key,
            thresholds,
            cache: Mutex::new(BTreeMap::new()),
            metrics,
        }
    }

    /// Threshold manager shared with the session
    pub fn thresholds(&self) -> &Arc<ThresholdManager> {
        &self.thresholds
    }

    /// Decide whether the local authority won `slot`
    ///
    /// Returns the winning output and proof, or `None` if the slot was lost.
    /// A local key outside the active authority set loses without proving.
    #[instrument(skip(self, slot), fields(slot = slot.number))]
    pub fn run_lottery(&self, slot: &Slot) -> Result<Option<OutputAndProof>> {
        // Held across evaluation so concurrent callers for the same slot
        // observe a single VRF call.
        let mut cache = self.cache.lock();
        if let Some(entry) = cache.get(&slot.number) {
            self.metrics.record_cache_hit();
            return Ok(entry.map(|won| won.claim));
        }

        let epoch = self.thresholds.current()?;
        let public_key = self.key.public_key().map_err(signing_unavailable)?;
        let Some(authority_index) = epoch.authority_index(&public_key) else {
            debug!(
                "[qc-17] Local key is not an authority in epoch {}, slot {} not contested",
                epoch.epoch_index, slot.number
            );
            cache.insert(slot.number, None);
            return Ok(None);
        };

        let input = VrfInput {
            slot_number: slot.number,
            epoch_index: epoch.epoch_index,
            randomness: epoch.randomness,
        };
        let claim = self.key.prove_vrf(&input).map_err(signing_unavailable)?;

        let won = epoch.threshold.is_winning(&claim.output);
        self.metrics.record_evaluation(won);
        let entry = won.then_some(SlotClaim {
            claim,
            authority_index,
        });
        cache.insert(slot.number, entry);

        if won {
            info!(
                "[qc-17] Won slot {} (epoch {}, authority {})",
                slot.number, epoch.epoch_index, authority_index
            );
        } else {
            debug!("[qc-17] Slot {} not won", slot.number);
        }
        Ok(entry.map(|won| won.claim))
    }

    /// Cached result for a slot without evaluating
    ///
    /// Outer `None` means the slot was never evaluated.
    pub fn cached(&self, slot_number: u64) -> Option<Option<OutputAndProof>> {
        self.cache
            .lock()
            .get(&slot_number)
            .map(|entry| entry.map(|won| won.claim))
    }

    /// Drop cached results for slots below `floor`, returning how many were
    /// removed
    pub fn prune_before(&self, floor: u64) -> usize {
        let mut cache = self.cache.lock();
        let kept = cache.split_off(&floor);
        let removed = cache.len();
        *cache = kept;
        if removed > 0 {
            debug!("[qc-17] Pruned {} cached lottery results below slot {}", removed, floor);
        }
        removed
    }

    /// Number of cached results
    pub fn cache_len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Build the header pre-digest for a won slot
    ///
    /// Uses only what the lottery cached for the slot; a later epoch change
    /// does not alter the authority index of an earlier claim.
    pub fn build_pre_digest(&self, slot: &Slot) -> Result<PreDigest> {
        match self.cache.lock().get(&slot.number) {
            Some(Some(won)) => Ok(PreDigest::new(slot, won.authority_index, &won.claim)),
            _ => Err(SlotProductionError::NotProposer { slot: slot.number }),
        }
    }
}

fn signing_unavailable(e: SlotProductionError) -> SlotProductionError {
    match e {
        SlotProductionError::SigningUnavailable(_) => e,
        other => SlotProductionError::SigningUnavailable(other.to_string()),
    }
}
