//! Local sr25519 keystore
//!
//! Keys are held in memory, one per key type. Secrets are 32-byte mini
//! secret keys expanded with Ed25519-compatible expansion.

use crate::domain::{vrf, AuthorityId, OutputAndProof, VrfInput};
use crate::error::{Result, SlotProductionError};
use crate::ports::KeySource;
use parking_lot::RwLock;
use schnorrkel::{ExpansionMode, Keypair, MiniSecretKey};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Signature scheme a key type uses
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CryptoScheme {
    /// Schnorr over Ristretto25519
    Sr25519,
}

/// Four-character key type identifiers
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum KeyType {
    /// Slot production (`babe`)
    Babe,
    /// Finality voting (`gran`)
    Grandpa,
    /// Account keys (`acco`)
    Account,
    /// Round-robin authoring (`aura`)
    Aura,
    /// Liveness reporting (`imon`)
    ImOnline,
    /// Authority discovery (`audi`)
    AuthorityDiscovery,
    /// Test keys (`dumy`)
    Dummy,
}

impl KeyType {
    /// Identifier string
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Babe => "babe",
            KeyType::Grandpa => "gran",
            KeyType::Account => "acco",
            KeyType::Aura => "aura",
            KeyType::ImOnline => "imon",
            KeyType::AuthorityDiscovery => "audi",
            KeyType::Dummy => "dumy",
        }
    }

    /// Crypto scheme used by keys of this type
    pub fn scheme(&self) -> CryptoScheme {
        CryptoScheme::Sr25519
    }
}

impl FromStr for KeyType {
    type Err = SlotProductionError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "babe" => Ok(KeyType::Babe),
            "gran" => Ok(KeyType::Grandpa),
            "acco" => Ok(KeyType::Account),
            "aura" => Ok(KeyType::Aura),
            "imon" => Ok(KeyType::ImOnline),
            "audi" => Ok(KeyType::AuthorityDiscovery),
            "dumy" => Ok(KeyType::Dummy),
            other => Err(SlotProductionError::UnknownKeyType(other.to_string())),
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn decode_hex32(value: &str, what: &str) -> Result<[u8; 32]> {
    let trimmed = value.strip_prefix("0x").unwrap_or(value);
    let bytes = hex::decode(trimmed)
        .map_err(|e| SlotProductionError::InvalidKey(format!("{what}: {e}")))?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        SlotProductionError::InvalidKey(format!("{what} must be 32 bytes, got {}", bytes.len()))
    })
}

fn expand(secret: &[u8; 32]) -> Result<Keypair> {
    let mini = MiniSecretKey::from_bytes(secret)
        .map_err(|e| SlotProductionError::InvalidKey(e.to_string()))?;
    Ok(mini.expand_to_keypair(ExpansionMode::Ed25519))
}

/// In-memory keystore holding at most one key per [`KeyType`]
#[derive(Default)]
pub struct LocalKeystore {
    keys: RwLock<HashMap<KeyType, Keypair>>,
}

impl LocalKeystore {
    /// Create an empty keystore
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a key from hex-encoded secret and public key
    ///
    /// The public key derived from the secret must equal `public_hex`
    /// byte for byte.
    pub fn insert_key(
        &self,
        key_type: KeyType,
        secret_hex: &str,
        public_hex: &str,
    ) -> Result<AuthorityId> {
        let secret = decode_hex32(secret_hex, "secret key")?;
        let provided = decode_hex32(public_hex, "public key")?;
        let keypair = expand(&secret)?;
        let derived = keypair.public.to_bytes();

        if derived != provided {
            return Err(SlotProductionError::PublicKeyMismatch {
                derived: hex::encode(derived),
                provided: hex::encode(provided),
            });
        }

        info!("[qc-17] Inserted {} key 0x{}", key_type, hex::encode(derived));
        self.keys.write().insert(key_type, keypair);
        Ok(derived)
    }

    /// Generate a fresh key, replacing any existing key of the same type
    pub fn generate(&self, key_type: KeyType) -> AuthorityId {
        let keypair = MiniSecretKey::generate().expand_to_keypair(ExpansionMode::Ed25519);
        let public = keypair.public.to_bytes();
        debug!("[qc-17] Generated {} key 0x{}", key_type, hex::encode(public));
        self.keys.write().insert(key_type, keypair);
        public
    }

    /// Remove the key of a type, returning whether one existed
    pub fn remove(&self, key_type: KeyType) -> bool {
        self.keys.write().remove(&key_type).is_some()
    }

    /// Public key stored for a type
    pub fn public_key(&self, key_type: KeyType) -> Option<AuthorityId> {
        self.keys
            .read()
            .get(&key_type)
            .map(|keypair| keypair.public.to_bytes())
    }

    fn prove(&self, key_type: KeyType, input: &VrfInput) -> Result<OutputAndProof> {
        let keys = self.keys.read();
        let keypair = keys.get(&key_type).ok_or_else(|| {
            SlotProductionError::SigningUnavailable(format!("no {key_type} key in keystore"))
        })?;
        Ok(vrf::prove(keypair, input))
    }
}

/// Slot claiming key: a keystore entry used as a [`KeySource`]
#[derive(Clone)]
pub struct SlotKey {
    keystore: Arc<LocalKeystore>,
    key_type: KeyType,
}

impl SlotKey {
    /// Use the key of `key_type` in `keystore`
    pub fn new(keystore: Arc<LocalKeystore>, key_type: KeyType) -> Self {
        Self { keystore, key_type }
    }

    /// Key type in use
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }
}

impl KeySource for SlotKey {
    fn public_key(&self) -> Result<AuthorityId> {
        self.keystore.public_key(self.key_type).ok_or_else(|| {
            SlotProductionError::SigningUnavailable(format!(
                "no {} key in keystore",
                self.key_type
            ))
        })
    }

    fn prove_vrf(&self, input: &VrfInput) -> Result<OutputAndProof> {
        self.keystore.prove(self.key_type, input)
    }
}
