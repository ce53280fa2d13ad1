//! Domain entities for slot production

use super::pre_digest::PreDigest;
use crate::error::{Result, SlotProductionError};
use primitive_types::H256;
use serde::{Deserialize, Serialize};

/// VRF output length in bytes
pub const VRF_OUTPUT_LENGTH: usize = 32;

/// VRF proof length in bytes
pub const VRF_PROOF_LENGTH: usize = 64;

/// Position of an authority in the epoch's ordered authority set
pub type AuthorityIndex = u32;

/// Authority public key (sr25519)
pub type AuthorityId = [u8; 32];

/// A single slot, recomputed fresh for each tick
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    /// Slot number
    pub number: u64,

    /// Slot start (milliseconds)
    pub start: u64,

    /// Slot duration (milliseconds)
    pub duration: u64,
}

impl Slot {
    /// Create new slot
    pub fn new(number: u64, start: u64, duration: u64) -> Self {
        Self {
            number,
            start,
            duration,
        }
    }

    /// First millisecond after this slot
    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.duration)
    }
}

/// VRF output and proof for a slot claim
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputAndProof {
    /// VRF output (pre-output bytes)
    pub output: [u8; VRF_OUTPUT_LENGTH],

    /// VRF proof
    #[serde(with = "proof_bytes")]
    pub proof: [u8; VRF_PROOF_LENGTH],
}

impl OutputAndProof {
    /// Create from raw parts
    pub fn new(output: [u8; VRF_OUTPUT_LENGTH], proof: [u8; VRF_PROOF_LENGTH]) -> Self {
        Self { output, proof }
    }
}

/// Everything the VRF transcript commits to
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VrfInput {
    /// Slot being claimed
    pub slot_number: u64,

    /// Active epoch index
    pub epoch_index: u64,

    /// Epoch randomness
    pub randomness: [u8; 32],
}

/// Header digest entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DigestItem {
    /// Encoded [`PreDigest`]
    PreDigest(Vec<u8>),

    /// Block seal (signature over the header)
    Seal(Vec<u8>),

    /// Anything this subsystem does not interpret
    Other(Vec<u8>),
}

impl DigestItem {
    fn tag(&self) -> u8 {
        match self {
            Self::PreDigest(_) => 6,
            Self::Seal(_) => 5,
            Self::Other(_) => 0,
        }
    }

    fn data(&self) -> &[u8] {
        match self {
            Self::PreDigest(data) | Self::Seal(data) | Self::Other(data) => data,
        }
    }

    /// Canonical bytes: tag, u32 LE length, payload
    pub fn to_bytes(&self) -> Vec<u8> {
        let data = self.data();
        let mut out = Vec::with_capacity(5 + data.len());
        out.push(self.tag());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(data);
        out
    }
}

/// Block header as stored by the block store
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Parent block hash
    pub parent_hash: H256,

    /// Block number (height)
    pub number: u64,

    /// Digest list
    pub digest: Vec<DigestItem>,
}

impl Header {
    /// Genesis header (no pre-digest, slot 0)
    pub fn genesis() -> Self {
        Self {
            parent_hash: H256::zero(),
            number: 0,
            digest: Vec::new(),
        }
    }

    /// Header hash
    pub fn hash(&self) -> H256 {
        crate::utils::hashing::header_hash(self)
    }

    /// Decode the first pre-digest entry, if any
    pub fn pre_digest(&self) -> Result<Option<PreDigest>> {
        self.digest
            .iter()
            .find_map(|item| match item {
                DigestItem::PreDigest(data) => Some(data),
                _ => None,
            })
            .map(|data| PreDigest::decode(data))
            .transpose()
    }

    /// Slot this header was produced in. Genesis sits at slot 0.
    pub fn slot_number(&self) -> Result<u64> {
        if self.number == 0 {
            return Ok(0);
        }
        self.pre_digest()?
            .map(|pre_digest| pre_digest.slot_number)
            .ok_or_else(|| SlotProductionError::MissingPreDigest(self.hash()))
    }
}

/// Block: header plus opaque extrinsics
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block header
    pub header: Header,

    /// Encoded extrinsics
    pub body: Vec<Vec<u8>>,
}

impl Block {
    /// Block hash
    pub fn hash(&self) -> H256 {
        self.header.hash()
    }
}

pub(crate) mod proof_bytes {
    use super::VRF_PROOF_LENGTH;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        proof: &[u8; VRF_PROOF_LENGTH],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(proof))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<[u8; VRF_PROOF_LENGTH], D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(encoded).map_err(D::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| D::Error::custom("vrf proof must be 64 bytes"))
    }
}
