//! Slot claim pre-digest
//!
//! The pre-digest is embedded in the header digest list of every produced
//! block. Receivers decode it and re-verify the VRF proof against the
//! claimed authority's key, the slot they compute themselves and the
//! epoch threshold, so the layout is fixed:
//!
//! ```text
//! [ slot_number: u64 LE ][ authority_index: u32 LE ][ vrf_output: 32 ][ vrf_proof: 64 ]
//! ```

use super::entities::{
    AuthorityIndex, DigestItem, OutputAndProof, Slot, VRF_OUTPUT_LENGTH, VRF_PROOF_LENGTH,
};
use crate::error::{Result, SlotProductionError};
use serde::{Deserialize, Serialize};

/// Exact encoded length of a pre-digest
pub const PRE_DIGEST_LENGTH: usize = 8 + 4 + VRF_OUTPUT_LENGTH + VRF_PROOF_LENGTH;

const SLOT_END: usize = 8;
const INDEX_END: usize = SLOT_END + 4;
const OUTPUT_END: usize = INDEX_END + VRF_OUTPUT_LENGTH;

/// Slot claim carried in a block header
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreDigest {
    /// Claimed slot
    pub slot_number: u64,

    /// Claiming authority
    pub authority_index: AuthorityIndex,

    /// VRF output
    pub vrf_output: [u8; VRF_OUTPUT_LENGTH],

    /// VRF proof
    #[serde(with = "super::entities::proof_bytes")]
    pub vrf_proof: [u8; VRF_PROOF_LENGTH],
}

impl PreDigest {
    /// Build the pre-digest for a won slot
    pub fn new(slot: &Slot, authority_index: AuthorityIndex, claim: &OutputAndProof) -> Self {
        Self {
            slot_number: slot.number,
            authority_index,
            vrf_output: claim.output,
            vrf_proof: claim.proof,
        }
    }

    /// Canonical encoding
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PRE_DIGEST_LENGTH);
        out.extend_from_slice(&self.slot_number.to_le_bytes());
        out.extend_from_slice(&self.authority_index.to_le_bytes());
        out.extend_from_slice(&self.vrf_output);
        out.extend_from_slice(&self.vrf_proof);
        out
    }

    /// Decode, rejecting any buffer that is not exactly [`PRE_DIGEST_LENGTH`] bytes
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PRE_DIGEST_LENGTH {
            return Err(SlotProductionError::EncodingError(format!(
                "pre-digest must be {} bytes, got {}",
                PRE_DIGEST_LENGTH,
                bytes.len()
            )));
        }

        let mut slot = [0u8; 8];
        slot.copy_from_slice(&bytes[..SLOT_END]);
        let mut index = [0u8; 4];
        index.copy_from_slice(&bytes[SLOT_END..INDEX_END]);
        let mut vrf_output = [0u8; VRF_OUTPUT_LENGTH];
        vrf_output.copy_from_slice(&bytes[INDEX_END..OUTPUT_END]);
        let mut vrf_proof = [0u8; VRF_PROOF_LENGTH];
        vrf_proof.copy_from_slice(&bytes[OUTPUT_END..]);

        Ok(Self {
            slot_number: u64::from_le_bytes(slot),
            authority_index: u32::from_le_bytes(index),
            vrf_output,
            vrf_proof,
        })
    }

    /// Output and proof carried by this claim
    pub fn claim(&self) -> OutputAndProof {
        OutputAndProof::new(self.vrf_output, self.vrf_proof)
    }

    /// Header digest entry for this claim
    pub fn to_digest_item(&self) -> DigestItem {
        DigestItem::PreDigest(self.encode())
    }
}
