//! Outbound events (published)

use crate::domain::{AuthorityIndex, PreDigest};
use chrono::{DateTime, Utc};
use primitive_types::H256;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current event schema version
pub const EVENT_VERSION: u16 = 1;

/// Topic for [`SlotClaimedEvent`]
pub const SLOT_CLAIMED_TOPIC: &str = "qc-17.slot-claimed";

/// Topic for [`BlockProducedEvent`]
pub const BLOCK_PRODUCED_TOPIC: &str = "qc-17.block-produced";

/// Event: Local authority won a slot
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SlotClaimedEvent {
    /// Event version
    pub version: u16,

    /// Sender subsystem ID (always 17)
    pub sender_id: u8,

    /// Correlates this claim with the block produced for it
    pub correlation_id: Uuid,

    /// Won slot
    pub slot_number: u64,

    /// Epoch the slot belongs to
    pub epoch_index: u64,

    /// Local authority index
    pub authority_index: AuthorityIndex,

    /// Block the new block will build on
    pub parent_hash: H256,

    /// Hex-encoded VRF output
    pub vrf_output: String,

    /// Event timestamp
    pub timestamp: DateTime<Utc>,
}

impl SlotClaimedEvent {
    /// Build the event for a claim
    pub fn new(
        correlation_id: Uuid,
        epoch_index: u64,
        parent_hash: H256,
        pre_digest: &PreDigest,
    ) -> Self {
        Self {
            version: EVENT_VERSION,
            sender_id: crate::SUBSYSTEM_ID,
            correlation_id,
            slot_number: pre_digest.slot_number,
            epoch_index,
            authority_index: pre_digest.authority_index,
            parent_hash,
            vrf_output: hex::encode(pre_digest.vrf_output),
            timestamp: Utc::now(),
        }
    }
}

/// Event: Block assembled for a won slot and handed to the broadcaster
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockProducedEvent {
    /// Event version
    pub version: u16,

    /// Sender subsystem ID (always 17)
    pub sender_id: u8,

    /// Same id as the matching [`SlotClaimedEvent`]
    pub correlation_id: Uuid,

    /// Produced block hash
    pub block_hash: H256,

    /// Block number
    pub block_number: u64,

    /// Slot the block was produced in
    pub slot_number: u64,

    /// Transaction count
    pub transaction_count: u32,

    /// Time from slot claim to broadcast, in milliseconds
    pub production_time_ms: u64,

    /// Event timestamp
    pub timestamp: DateTime<Utc>,
}
