//! # Quantum Chain - Slot Production Engine (Subsystem 17)
//!
//! **Bounded Context:** Slot-based block production
//! **Architecture Compliance:** DDD + Hexagonal + EDA + TDD
//!
//! ## Purpose
//!
//! Time is divided into fixed-length slots grouped into epochs. In every
//! slot each authority evaluates a VRF over the slot number and the epoch
//! randomness; an output below the epoch threshold makes it a legitimate
//! producer for that slot. This crate decides, slot by slot, whether the
//! local authority may produce a block and emits the verifiable claim
//! (pre-digest) that goes into the block header.
//!
//! ## Components
//!
//! 1. **Slot clock**: derives the current slot from the arrival times of
//!    recent best-chain blocks (median of per-block estimates), so nodes
//!    agree on slot boundaries without synchronized clocks
//! 2. **Threshold manager**: per-epoch threshold giving the configured
//!    network-wide production rate for the current authority count
//! 3. **Lottery engine**: sr25519 VRF evaluation with a per-slot proof cache
//! 4. **Pre-digest**: fixed 108-byte claim carried in produced headers
//! 5. **Session driver**: slot ticker handing won slots to assembly
//!
//! ## Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  Adapters (Outer)                                   │
//! │  - LocalKeystore / SlotKey (sr25519)                │
//! │  - InMemoryBlockStore                               │
//! └─────────────────────────────────────────────────────┘
//!                         │
//! ┌─────────────────────────────────────────────────────┐
//! │  Ports (Middle)                                     │
//! │  - Inbound: SlotProducerService                     │
//! │  - Outbound: BlockStore, KeySource, WallClock,      │
//! │    TransactionSource, BlockAssembler,               │
//! │    BlockBroadcaster, EventPublisher                 │
//! └─────────────────────────────────────────────────────┘
//!                         │
//! ┌─────────────────────────────────────────────────────┐
//! │  Domain (Inner - Pure Logic)                        │
//! │  - SlotClock, ThresholdManager, LotteryEngine       │
//! │  - PreDigest encoding                               │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Critical Invariants
//!
//! 1. **One evaluation per slot**: the first lottery result for a slot is
//!    final; repeated calls return it without a new VRF call
//! 2. **Monotonic handling**: a slot at or below the last handled slot, or
//!    not after the best block's slot, is never handled
//! 3. **Threshold monotonicity**: more authorities never raise the threshold
//! 4. **Fixed claim layout**: a pre-digest is exactly 108 bytes
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! let keystore = Arc::new(LocalKeystore::new());
//! let public = keystore.generate(KeyType::Babe);
//! let key = Arc::new(SlotKey::new(keystore, KeyType::Babe));
//!
//! let ports = SessionPorts::new(store, key, transactions, assembler, broadcaster);
//! let session = SlotSession::new(SlotProductionConfig::default(), ports)?;
//! session.begin_epoch(0, randomness, vec![public])?;
//! session.start()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Keystore and block store adapters
pub mod adapters;
/// Domain models and slot production logic
pub mod domain;
/// Event type definitions
pub mod events;
/// Hexagonal architecture ports
pub mod ports;
/// Slot session driver
pub mod service;
/// Hashing helpers
pub mod utils;

mod config;
mod error;
mod metrics;

pub use config::{SlotProductionConfig, TargetRate};
pub use error::{Result, SlotProductionError};
pub use metrics::Metrics;

// Re-export commonly used types
pub use domain::{
    calculate_threshold, median, slot_offset, verify_vrf, AuthorityId, AuthorityIndex, Block,
    DigestItem, EpochData, EpochThreshold, Header, LotteryEngine, OutputAndProof, PreDigest, Slot,
    SlotClock, ThresholdManager, VrfInput, PRE_DIGEST_LENGTH,
};

pub use ports::{
    BlockAssembler, BlockBroadcaster, BlockRequest, BlockStore, EventPublisher, KeySource,
    SessionStatus, SlotProducerService, SystemWallClock, TransactionSource, WallClock,
};

pub use adapters::{CryptoScheme, InMemoryBlockStore, KeyType, LocalKeystore, SlotKey};

pub use events::{BlockProducedEvent, SlotClaimedEvent};

pub use service::{SessionPorts, SlotOutcome, SlotSession};

/// Subsystem identifier for IPC communication
pub const SUBSYSTEM_ID: u8 = 17;

/// Default slot duration (6 seconds)
pub const DEFAULT_SLOT_DURATION_MS: u64 = 6_000;

/// Default epoch length in slots
pub const DEFAULT_EPOCH_LENGTH: u64 = 200;

/// Default number of recent blocks sampled by the slot clock
pub const DEFAULT_SLOT_LOOKBACK: u64 = 20;

/// Maximum transactions requested per produced block
pub const MAX_BLOCK_TRANSACTIONS: u32 = 1_000;
