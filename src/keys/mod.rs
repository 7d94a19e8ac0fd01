//! Ed25519 account keys, signing capabilities and key structures.
//!
//! A [`Signer`] is an opaque capability: it can produce signatures and expose
//! its public key, but never hands out private key material.

pub mod registry;
pub mod threshold;

use core::fmt;
use core::str::FromStr;
use std::collections::BTreeSet;
use std::sync::Arc;

use ed25519_dalek::{Signer as _, SigningKey, Verifier as _, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroizing;

use crate::error::{HarnessError, Result};

pub use registry::{Actor, SignerRegistry};
pub use threshold::{build_threshold, SigningPolicy, ThresholdPolicy};

/// DER prefix of a PKCS#8 encoded ed25519 private key.
const ED25519_PRIVATE_DER_PREFIX: &str = "302e020100300506032b657004220420";

/// DER prefix of an SPKI encoded ed25519 public key.
const ED25519_PUBLIC_DER_PREFIX: &str = "302a300506032b6570032100";

/// Ed25519 signature length in bytes.
pub const SIGNATURE_LENGTH: usize = 64;

fn decode_hex_key(input: &str, der_prefix: &str) -> Result<Zeroizing<Vec<u8>>> {
    let trimmed = input.trim();
    let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let body = trimmed
        .strip_prefix(der_prefix)
        .unwrap_or(trimmed);

    let bytes = Zeroizing::new(hex::decode(body).map_err(|e| HarnessError::InvalidKey {
        reason: e.to_string(),
    })?);
    if bytes.len() != 32 {
        return Err(HarnessError::InvalidKey {
            reason: format!("expected 32 key bytes, got {}", bytes.len()),
        });
    }
    Ok(bytes)
}

/// Ed25519 private key. Zeroized on drop.
#[derive(Clone)]
pub struct PrivateKey {
    inner: SigningKey,
}

impl PrivateKey {
    /// Generate a fresh random key.
    pub fn generate() -> Self {
        Self {
            inner: SigningKey::generate(&mut OsRng),
        }
    }

    /// Create from a 32-byte seed.
    pub fn from_bytes(seed: &[u8; 32]) -> Self {
        Self {
            inner: SigningKey::from_bytes(seed),
        }
    }

    /// Parse a raw or DER-prefixed hex encoded key.
    pub fn from_str_ed25519(input: &str) -> Result<Self> {
        let bytes = decode_hex_key(input, ED25519_PRIVATE_DER_PREFIX)?;
        let mut seed = Zeroizing::new([0u8; 32]);
        seed.copy_from_slice(&bytes);
        Ok(Self::from_bytes(&seed))
    }

    /// Public half of this key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.inner.verifying_key().to_bytes())
    }

    /// Sign `message`, returning the 64-byte signature.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.inner.sign(message).to_bytes().to_vec()
    }

    /// DER encoded hex string, as used in fixture files.
    pub fn to_string_der(&self) -> String {
        let encoded = Zeroizing::new(hex::encode(self.inner.to_bytes()));
        format!("{}{}", ED25519_PRIVATE_DER_PREFIX, encoded.as_str())
    }
}

impl FromStr for PrivateKey {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_str_ed25519(s)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Ed25519 public key.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    /// Wrap raw key bytes. Validity is checked on verification.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a raw or DER-prefixed hex encoded key.
    pub fn from_str_ed25519(input: &str) -> Result<Self> {
        let bytes = decode_hex_key(input, ED25519_PUBLIC_DER_PREFIX)?;
        let mut raw = [0u8; 32];
        raw.copy_from_slice(&bytes);
        Ok(Self(raw))
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// DER encoded hex string.
    pub fn to_string_der(&self) -> String {
        format!("{}{}", ED25519_PUBLIC_DER_PREFIX, hex::encode(self.0))
    }

    /// Verify `signature` over `message`.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        let Ok(signature) = ed25519_dalek::Signature::from_slice(signature) else {
            return false;
        };
        key.verify(message, &signature).is_ok()
    }
}

impl FromStr for PublicKey {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_str_ed25519(s)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}..)", &hex::encode(&self.0[..6]))
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str_ed25519(&s).map_err(serde::de::Error::custom)
    }
}

/// A signature attached to a transaction, paired with the key that made it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignaturePair {
    pub public_key: PublicKey,
    #[serde(with = "crate::utils::serde_hex")]
    pub signature: Vec<u8>,
}

/// Shared signing capability bound to one private key.
///
/// Cloning is cheap; every clone signs with the same key.
#[derive(Clone)]
pub struct Signer {
    key: Arc<PrivateKey>,
    public_key: PublicKey,
}

impl Signer {
    /// Wrap a private key.
    pub fn new(key: PrivateKey) -> Self {
        let public_key = key.public_key();
        Self {
            key: Arc::new(key),
            public_key,
        }
    }

    /// Create a signer with a freshly generated key.
    pub fn generate() -> Self {
        Self::new(PrivateKey::generate())
    }

    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    /// Sign `message`.
    pub fn sign(&self, message: &[u8]) -> SignaturePair {
        SignaturePair {
            public_key: self.public_key,
            signature: self.key.sign(message),
        }
    }

    /// DER encoded private key, for writing fixture files.
    pub(crate) fn export_der(&self) -> String {
        self.key.to_string_der()
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Signer").field(&self.public_key).finish()
    }
}

/// Key structure guarding an account, token role or topic.
///
/// A `Threshold` key is satisfied when at least `threshold` of its child keys
/// are satisfied. Children may themselves be threshold keys.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Key {
    Single(PublicKey),
    Threshold { threshold: usize, keys: Vec<Key> },
}

impl Key {
    /// Whether the given set of signing keys satisfies this key.
    pub fn is_satisfied_by(&self, signed: &BTreeSet<PublicKey>) -> bool {
        match self {
            Key::Single(pk) => signed.contains(pk),
            Key::Threshold { threshold, .. } => self.satisfied_count(signed) >= *threshold,
        }
    }

    /// Number of direct children satisfied by `signed` (1 or 0 for a single key).
    pub fn satisfied_count(&self, signed: &BTreeSet<PublicKey>) -> usize {
        match self {
            Key::Single(pk) => usize::from(signed.contains(pk)),
            Key::Threshold { keys, .. } => keys.iter().filter(|k| k.is_satisfied_by(signed)).count(),
        }
    }

    /// Number of direct children that must be satisfied.
    pub fn required_count(&self) -> usize {
        match self {
            Key::Single(_) => 1,
            Key::Threshold { threshold, .. } => *threshold,
        }
    }

    /// Whether `public_key` appears anywhere in this key structure.
    pub fn contains(&self, public_key: &PublicKey) -> bool {
        match self {
            Key::Single(pk) => pk == public_key,
            Key::Threshold { keys, .. } => keys.iter().any(|k| k.contains(public_key)),
        }
    }
}

impl From<PublicKey> for Key {
    fn from(pk: PublicKey) -> Self {
        Key::Single(pk)
    }
}

impl From<&Signer> for Key {
    fn from(signer: &Signer) -> Self {
        Key::Single(signer.public_key())
    }
}
