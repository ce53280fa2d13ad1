//! Inbound ports (driving side - API)

use crate::domain::OutputAndProof;
use crate::error::Result;
use async_trait::async_trait;

/// Primary port: Slot production service
#[async_trait]
pub trait SlotProducerService: Send + Sync {
    /// Start the slot ticker
    async fn start(&self) -> Result<()>;

    /// Stop the slot ticker, waiting for an in-flight slot to finish
    async fn stop(&self) -> Result<()>;

    /// Current session status
    async fn status(&self) -> SessionStatus;

    /// Lottery result recorded for a slot
    ///
    /// `None` if the slot was never evaluated, `Some(None)` if it was lost.
    async fn slot_claim(&self, slot_number: u64) -> Option<Option<OutputAndProof>>;
}

/// Session status snapshot
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionStatus {
    /// Ticker is running
    pub active: bool,

    /// Index of the active epoch, if one has begun
    pub current_epoch: Option<u64>,

    /// Highest slot handed to the lottery
    pub last_handled_slot: Option<u64>,

    /// Highest slot won
    pub last_claimed_slot: Option<u64>,

    /// Slots evaluated by the lottery
    pub slots_evaluated: u64,

    /// Slots won
    pub slots_won: u64,

    /// Slots skipped on recoverable failures
    pub slots_skipped: u64,

    /// Blocks assembled and broadcast
    pub blocks_produced: u64,

    /// Error that stopped the ticker
    pub last_error: Option<String>,
}
