//! Single-key and M-of-N threshold signing policies.

use std::collections::BTreeSet;

use crate::error::{HarnessError, Result};
use crate::keys::{Key, PublicKey, Signer};

/// An M-of-N group of signing capabilities.
#[derive(Clone, Debug)]
pub struct ThresholdPolicy {
    threshold: usize,
    members: Vec<Signer>,
}

impl ThresholdPolicy {
    /// Required number of distinct member signatures.
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Members in the order they were supplied.
    pub fn members(&self) -> &[Signer] {
        &self.members
    }
}

/// How a transaction or entity is authorized: one key or a threshold group.
///
/// Both variants expose a [`Key`] so a threshold policy can be installed
/// anywhere a single key is accepted.
#[derive(Clone, Debug)]
pub enum SigningPolicy {
    Single(Signer),
    Threshold(ThresholdPolicy),
}

impl SigningPolicy {
    /// Single-key policy.
    pub fn single(signer: Signer) -> Self {
        SigningPolicy::Single(signer)
    }

    /// Public key structure for this policy.
    pub fn key(&self) -> Key {
        match self {
            SigningPolicy::Single(signer) => Key::Single(signer.public_key()),
            SigningPolicy::Threshold(policy) => Key::Threshold {
                threshold: policy.threshold,
                keys: policy
                    .members
                    .iter()
                    .map(|m| Key::Single(m.public_key()))
                    .collect(),
            },
        }
    }

    /// Whether `public_key` belongs to this policy's member set.
    pub fn admits(&self, public_key: &PublicKey) -> bool {
        self.signers().any(|s| s.public_key() == *public_key)
    }

    /// Every signing capability in the policy.
    pub fn signers(&self) -> impl Iterator<Item = &Signer> {
        let members: &[Signer] = match self {
            SigningPolicy::Single(signer) => core::slice::from_ref(signer),
            SigningPolicy::Threshold(policy) => &policy.members,
        };
        members.iter()
    }

    /// Signatures needed to satisfy the policy.
    pub fn required(&self) -> usize {
        match self {
            SigningPolicy::Single(_) => 1,
            SigningPolicy::Threshold(policy) => policy.threshold,
        }
    }
}

impl From<Signer> for SigningPolicy {
    fn from(signer: Signer) -> Self {
        SigningPolicy::Single(signer)
    }
}

impl From<&SigningPolicy> for Key {
    fn from(policy: &SigningPolicy) -> Self {
        policy.key()
    }
}

/// Compose `members` into a `threshold`-of-N policy.
///
/// Fails with [`HarnessError::InvalidPolicy`] unless `members` is non-empty,
/// free of duplicate keys, and `1 <= threshold <= members.len()`.
pub fn build_threshold(members: &[Signer], threshold: usize) -> Result<SigningPolicy> {
    if members.is_empty() {
        return Err(HarnessError::InvalidPolicy {
            reason: "threshold policy needs at least one member".into(),
        });
    }

    let mut seen = BTreeSet::new();
    for member in members {
        if !seen.insert(member.public_key()) {
            return Err(HarnessError::InvalidPolicy {
                reason: format!("duplicate member key {}", member.public_key()),
            });
        }
    }

    if threshold == 0 || threshold > members.len() {
        return Err(HarnessError::InvalidPolicy {
            reason: format!(
                "threshold {} outside 1..={} members",
                threshold,
                members.len()
            ),
        });
    }

    Ok(SigningPolicy::Threshold(ThresholdPolicy {
        threshold,
        members: members.to_vec(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signers(n: usize) -> Vec<Signer> {
        (0..n).map(|_| Signer::generate()).collect()
    }

    #[test]
    fn test_valid_threshold_policy() {
        let members = signers(3);
        let policy = build_threshold(&members, 2).unwrap();
        assert_eq!(policy.required(), 2);
        assert_eq!(policy.signers().count(), 3);
        assert!(policy.admits(&members[1].public_key()));
        assert!(!policy.admits(&Signer::generate().public_key()));

        match policy.key() {
            Key::Threshold { threshold, keys } => {
                assert_eq!(threshold, 2);
                assert_eq!(keys.len(), 3);
            }
            other => panic!("expected threshold key, got {:?}", other),
        }
    }

    #[test]
    fn test_threshold_bounds() {
        let members = signers(2);
        assert!(matches!(
            build_threshold(&members, 0),
            Err(HarnessError::InvalidPolicy { .. })
        ));
        assert!(matches!(
            build_threshold(&members, 3),
            Err(HarnessError::InvalidPolicy { .. })
        ));
        assert!(build_threshold(&members, 2).is_ok());
    }

    #[test]
    fn test_empty_and_duplicate_members() {
        assert!(build_threshold(&[], 1).is_err());

        let a = Signer::generate();
        let result = build_threshold(&[a.clone(), a], 1);
        assert!(matches!(result, Err(HarnessError::InvalidPolicy { .. })));
    }

    #[test]
    fn test_single_policy_key() {
        let signer = Signer::generate();
        let policy = SigningPolicy::single(signer.clone());
        assert_eq!(policy.key(), Key::Single(signer.public_key()));
        assert_eq!(policy.required(), 1);
    }
}
