//! sr25519 VRF over the slot transcript
//!
//! Transcript fields are appended in a fixed order with fixed labels; any
//! change here breaks verification of every block produced before it.

use super::entities::{AuthorityId, OutputAndProof, VrfInput};
use crate::error::{Result, SlotProductionError};
use merlin::Transcript;
use schnorrkel::vrf::{VRFPreOut, VRFProof};
use schnorrkel::{Keypair, PublicKey};

/// Domain separation label for slot lottery transcripts
pub const SLOT_VRF_CONTEXT: &[u8] = b"QC17SlotLottery";

/// Build the VRF transcript for a slot
pub fn make_transcript(input: &VrfInput) -> Transcript {
    let mut transcript = Transcript::new(SLOT_VRF_CONTEXT);
    transcript.append_u64(b"slot number", input.slot_number);
    transcript.append_u64(b"current epoch", input.epoch_index);
    transcript.append_message(b"chain randomness", &input.randomness);
    transcript
}

/// Evaluate the VRF with `keypair`
pub fn prove(keypair: &Keypair, input: &VrfInput) -> OutputAndProof {
    let (inout, proof, _) = keypair.vrf_sign(make_transcript(input));
    OutputAndProof::new(inout.to_preout().0, proof.to_bytes())
}

/// Check a claimed output and proof against `public_key`
///
/// Malformed key or proof bytes are errors; a well-formed proof that does
/// not verify yields `Ok(false)`.
pub fn verify_vrf(
    public_key: &AuthorityId,
    input: &VrfInput,
    claim: &OutputAndProof,
) -> Result<bool> {
    let public = PublicKey::from_bytes(public_key)
        .map_err(|e| SlotProductionError::InvalidKey(e.to_string()))?;
    let proof = VRFProof::from_bytes(&claim.proof)
        .map_err(|e| SlotProductionError::EncodingError(format!("VRF proof: {e}")))?;

    Ok(public
        .vrf_verify(make_transcript(input), &VRFPreOut(claim.output), &proof)
        .is_ok())
}
