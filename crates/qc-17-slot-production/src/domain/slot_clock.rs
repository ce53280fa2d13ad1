//! Slot clock: maps wall-clock time to slot numbers
//!
//! There is no trusted global clock, so the current slot is derived from
//! the chain itself. Each recent best-chain block contributes one estimate
//! from its recorded arrival time and the slot it claims; the median of
//! those estimates rejects the minority of blocks that arrived late or out
//! of order, and any drift of the local clock shows up as a shift shared by
//! all samples.
//!
//! All times are milliseconds. Slot estimates are rounded down.

use super::entities::Slot;
use crate::error::{Result, SlotProductionError};
use crate::ports::{BlockStore, WallClock};
use std::sync::Arc;
use tracing::{debug, trace};

/// Median of a non-empty sequence
///
/// Odd length returns the middle element of the sorted sequence, even length
/// the floor of the mean of the two central elements.
pub fn median(values: &[u64]) -> Result<u64> {
    if values.is_empty() {
        return Err(SlotProductionError::EmptyHistory);
    }

    let mut sorted = values.to_vec();
    sorted.sort_unstable();

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Ok(sorted[mid])
    } else {
        let (low, high) = (sorted[mid - 1], sorted[mid]);
        Ok(low + (high - low) / 2)
    }
}

/// Length of the slot interval `[start, end]`
pub fn slot_offset(start: u64, end: u64) -> Result<u64> {
    end.checked_sub(start)
        .ok_or(SlotProductionError::InvalidRange { start, end })
}

/// Slot and arrival time of one stored block
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ArrivalSample {
    /// Slot claimed by the block
    pub slot: u64,
    /// Arrival timestamp (ms)
    pub arrival: u64,
}

/// Converts between wall-clock time and slot numbers using recent block
/// arrivals as ground truth
pub struct SlotClock {
    store: Arc<dyn BlockStore>,
    wall_clock: Arc<dyn WallClock>,
    slot_duration: u64,
    lookback: u64,
}

impl SlotClock {
    /// Create a slot clock. `slot_duration` must be non-zero.
    pub fn new(
        store: Arc<dyn BlockStore>,
        wall_clock: Arc<dyn WallClock>,
        slot_duration: u64,
        lookback: u64,
    ) -> Result<Self> {
        if slot_duration == 0 {
            return Err(SlotProductionError::InvalidConfig(
                "slot duration must be non-zero".to_string(),
            ));
        }
        Ok(Self {
            store,
            wall_clock,
            slot_duration,
            lookback,
        })
    }

    /// Slot duration in milliseconds
    pub fn slot_duration(&self) -> u64 {
        self.slot_duration
    }

    /// Current wall-clock time in milliseconds
    pub fn now(&self) -> u64 {
        self.wall_clock.now_ms()
    }

    /// Up to `lookback` most recent best-chain blocks, newest first,
    /// genesis excluded
    pub fn recent_arrivals(&self, lookback: u64) -> Result<Vec<ArrivalSample>> {
        let mut samples = Vec::with_capacity(lookback.min(1024) as usize);
        let mut hash = self.store.best_block_hash()?;

        while (samples.len() as u64) < lookback {
            let header = self.store.header(&hash)?;
            if header.number == 0 {
                break;
            }
            samples.push(ArrivalSample {
                slot: header.slot_number()?,
                arrival: self.store.arrival_time(&hash)?,
            });
            hash = header.parent_hash;
        }

        Ok(samples)
    }

    /// Slot and arrival of the best block (genesis included)
    pub fn anchor(&self) -> Result<ArrivalSample> {
        let hash = self.store.best_block_hash()?;
        let header = self
            .store
            .header(&hash)
            .map_err(|_| SlotProductionError::EmptyHistory)?;
        let arrival = self
            .store
            .arrival_time(&hash)
            .map_err(|_| SlotProductionError::EmptyHistory)?;

        Ok(ArrivalSample {
            slot: header.slot_number()?,
            arrival,
        })
    }

    /// Projected wall-clock start of `target_slot`
    ///
    /// Every block in the lookback window projects
    /// `arrival + (target_slot - block_slot) * duration`; the median of the
    /// projections is returned. Fails with `InvalidRange` if a block in the
    /// window claims a slot after `target_slot`.
    pub fn slot_time(&self, target_slot: u64, lookback: u64) -> Result<u64> {
        let samples = self.recent_arrivals(lookback)?;
        if samples.is_empty() {
            return Err(SlotProductionError::EmptyHistory);
        }

        let projections = samples
            .iter()
            .map(|sample| {
                slot_offset(sample.slot, target_slot).map(|offset| {
                    sample
                        .arrival
                        .saturating_add(offset.saturating_mul(self.slot_duration))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let start = median(&projections)?;
        trace!(
            "[qc-17] slot_time({}) = {} from {} samples",
            target_slot,
            start,
            projections.len()
        );
        Ok(start)
    }

    /// Single-anchor estimate from the best block only
    ///
    /// Used when there is no history yet (right after genesis). Any time
    /// past the best block's arrival counts as a started slot, so the
    /// estimate is `best + ceil((now - arrival) / d)`.
    pub fn estimate_current_slot(&self) -> Result<u64> {
        let anchor = self.anchor()?;
        let elapsed = self.now().saturating_sub(anchor.arrival);
        Ok(anchor
            .slot
            .saturating_add(elapsed.div_ceil(self.slot_duration)))
    }

    /// Steady-state estimate: median over the lookback window of per-block
    /// estimates of the current slot
    pub fn get_current_slot(&self) -> Result<u64> {
        let samples = self.recent_arrivals(self.lookback)?;
        if samples.is_empty() {
            return Err(SlotProductionError::EmptyHistory);
        }

        let now = self.now();
        let estimates: Vec<u64> = samples
            .iter()
            .map(|sample| self.slot_since(*sample, now))
            .collect();
        median(&estimates)
    }

    /// Current slot, falling back to the single-anchor estimate when the
    /// chain has no history beyond genesis
    pub fn current_slot(&self) -> Result<u64> {
        match self.get_current_slot() {
            Err(SlotProductionError::EmptyHistory) => {
                debug!("[qc-17] No slot history yet, using best-block anchor");
                self.estimate_current_slot()
            }
            other => other,
        }
    }

    /// Projected start of `target_slot`, falling back to the best-block
    /// anchor when the chain has no history beyond genesis
    pub fn slot_start(&self, target_slot: u64) -> Result<u64> {
        match self.slot_time(target_slot, self.lookback) {
            Err(SlotProductionError::EmptyHistory) => {
                let anchor = self.anchor()?;
                let offset = slot_offset(anchor.slot, target_slot)?;
                Ok(anchor
                    .arrival
                    .saturating_add(offset.saturating_mul(self.slot_duration)))
            }
            other => other,
        }
    }

    /// Build the [`Slot`] for a slot number
    pub fn slot(&self, number: u64) -> Result<Slot> {
        Ok(Slot::new(
            number,
            self.slot_start(number)?,
            self.slot_duration,
        ))
    }

    fn slot_since(&self, sample: ArrivalSample, now: u64) -> u64 {
        sample.slot + now.saturating_sub(sample.arrival) / self.slot_duration
    }
}
