//! Hashing and encoding helpers.

use sha3::{Digest, Sha3_256, Sha3_384};

/// SHA3-256 hash helper.
pub fn sha3_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Fold a message into a topic's running hash.
///
/// running_hash' = SHA3-384(running_hash || topic || seq || consensus_nanos || message)
pub fn next_running_hash(
    previous: &[u8],
    topic_num: u64,
    sequence_number: u64,
    consensus_nanos: i64,
    message: &[u8],
) -> Vec<u8> {
    let mut hasher = Sha3_384::new();
    hasher.update(previous);
    hasher.update(topic_num.to_be_bytes());
    hasher.update(sequence_number.to_be_bytes());
    hasher.update(consensus_nanos.to_be_bytes());
    hasher.update(message);
    hasher.finalize().to_vec()
}

/// Serde adapter encoding byte vectors as lowercase hex strings.
pub mod serde_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha3_256_deterministic() {
        assert_eq!(sha3_256(b"abc"), sha3_256(b"abc"));
        assert_ne!(sha3_256(b"abc"), sha3_256(b"abd"));
    }

    #[test]
    fn test_running_hash_depends_on_sequence() {
        let a = next_running_hash(&[0u8; 48], 5, 1, 10, b"hi");
        let b = next_running_hash(&[0u8; 48], 5, 2, 10, b"hi");
        assert_eq!(a.len(), 48);
        assert_ne!(a, b);
    }
}
