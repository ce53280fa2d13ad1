//! Error types for the slot production subsystem

use primitive_types::H256;
use thiserror::Error;

/// Result type alias for slot production operations
pub type Result<T> = std::result::Result<T, SlotProductionError>;

/// Errors that can occur during slot production
#[derive(Debug, Error)]
pub enum SlotProductionError {
    /// Slot interval with `start > end`
    #[error("Invalid slot range: start {start} is after end {end}")]
    InvalidRange {
        /// Interval start
        start: u64,
        /// Interval end
        end: u64,
    },

    /// No block history to estimate time from
    #[error("No block history available for slot estimation")]
    EmptyHistory,

    /// Local key source cannot produce a VRF proof
    #[error("Signing unavailable: {0}")]
    SigningUnavailable(String),

    /// Pre-digest or numeric encoding failure
    #[error("Encoding error: {0}")]
    EncodingError(String),

    /// Lottery invoked before an epoch threshold was computed
    #[error("Epoch threshold has not been set")]
    ThresholdUnset,

    /// Key type identifier not recognised
    #[error("Unknown key type: {0}")]
    UnknownKeyType(String),

    /// Derived public key differs from the one supplied with the secret
    #[error("Public key mismatch: derived {derived}, provided {provided}")]
    PublicKeyMismatch {
        /// Hex public key derived from the secret
        derived: String,
        /// Hex public key supplied by the caller
        provided: String,
    },

    /// Malformed key material
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Threshold requested for an empty authority set
    #[error("Authority set is empty")]
    EmptyAuthoritySet,

    /// Pre-digest requested for a slot this authority did not win
    #[error("Not selected as proposer for slot {slot}")]
    NotProposer {
        /// Slot number
        slot: u64,
    },

    /// Non-genesis header without a pre-digest entry
    #[error("Header {0:?} has no pre-digest")]
    MissingPreDigest(H256),

    /// Block not known to the store
    #[error("Unknown block: {0:?}")]
    UnknownBlock(H256),

    /// Block store failure
    #[error("Store error: {0}")]
    StoreError(String),

    /// Block assembly collaborator failure
    #[error("Assembly error: {0}")]
    AssemblyError(String),

    /// Broadcast/import collaborator failure
    #[error("Broadcast error: {0}")]
    BroadcastError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Session already running
    #[error("Slot session already running")]
    AlreadyRunning,

    /// Session not running
    #[error("Slot session not active")]
    NotActive,

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl SlotProductionError {
    /// Check if error only affects the current slot (skip and continue)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::SigningUnavailable(_)
                | Self::NotProposer { .. }
                | Self::AssemblyError(_)
                | Self::BroadcastError(_)
                | Self::StoreError(_)
        )
    }

    /// Check if error is critical (should stop production)
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Self::InvalidRange { .. }
                | Self::EncodingError(_)
                | Self::InvalidConfig(_)
                | Self::InternalError(_)
        )
    }
}
