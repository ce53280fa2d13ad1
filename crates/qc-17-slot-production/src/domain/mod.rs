//! Domain layer - slot timing, lottery and claims
//!
//! Everything here is synchronous. Store and key access go through the
//! outbound ports; the session driver in [`crate::service`] supplies the
//! async edges.
//!
//! - [`SlotClock`]: slot estimation from block arrival times
//! - [`ThresholdManager`]: per-epoch win threshold
//! - [`LotteryEngine`]: VRF lottery with proof cache and pre-digest builder
//! - [`PreDigest`]: fixed-layout slot claim carried in headers

mod entities;
pub mod lottery;
mod pre_digest;
pub mod slot_clock;
pub mod threshold;
pub mod vrf;

pub use entities::*;
pub use lottery::LotteryEngine;
pub use pre_digest::{PreDigest, PRE_DIGEST_LENGTH};
pub use slot_clock::{median, slot_offset, ArrivalSample, SlotClock};
pub use threshold::{calculate_threshold, EpochData, EpochThreshold, ThresholdManager};
pub use vrf::verify_vrf;
