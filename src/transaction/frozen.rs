//! Immutable, fee-payer-bound transactions and signature collection.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::keys::{Key, PublicKey, SignaturePair, Signer, SigningPolicy};
use crate::transaction::{SignedTransaction, TransactionBody};
use crate::types::TransactionId;
use crate::utils::sha3_256;

#[derive(Debug)]
struct FrozenCore {
    body: TransactionBody,
    body_bytes: Vec<u8>,
    hash: [u8; 32],
}

/// A frozen transaction plus the signatures collected so far.
///
/// Signing returns a new view over the same immutable core; the body and its
/// bytes never change after freeze.
#[derive(Clone, Debug)]
pub struct FrozenTransaction {
    core: Arc<FrozenCore>,
    signatures: BTreeMap<PublicKey, Vec<u8>>,
    /// Key structures that must be satisfied before submission.
    requirements: Vec<Key>,
}

impl FrozenTransaction {
    pub(crate) fn new(body: TransactionBody, payer: &SigningPolicy) -> Result<Self> {
        let body_bytes = body.to_bytes()?;
        let hash = sha3_256(&body_bytes);

        let mut frozen = Self {
            core: Arc::new(FrozenCore {
                body,
                body_bytes,
                hash,
            }),
            signatures: BTreeMap::new(),
            requirements: Vec::new(),
        };
        frozen.require(payer.key());
        for signer in payer.signers() {
            frozen.attach(signer);
        }
        Ok(frozen)
    }

    pub fn body(&self) -> &TransactionBody {
        &self.core.body
    }

    pub fn transaction_id(&self) -> TransactionId {
        self.core.body.transaction_id
    }

    /// Bytes covered by every signature.
    pub fn body_bytes(&self) -> &[u8] {
        &self.core.body_bytes
    }

    /// SHA3-256 of the body bytes.
    pub fn hash(&self) -> [u8; 32] {
        self.core.hash
    }

    /// Whether two views share the same frozen core.
    pub fn same_core(&self, other: &FrozenTransaction) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }

    /// Keys that have signed.
    pub fn signed_keys(&self) -> BTreeSet<PublicKey> {
        self.signatures.keys().copied().collect()
    }

    pub fn signature_count(&self) -> usize {
        self.signatures.len()
    }

    pub fn requirements(&self) -> &[Key] {
        &self.requirements
    }

    /// Register `policy` as a requirement without signing.
    ///
    /// Until a policy is registered, by this or by signing with it, it does
    /// not gate submission.
    pub fn require_policy(&self, policy: &SigningPolicy) -> Self {
        let mut next = self.clone();
        next.require(policy.key());
        next
    }

    /// Register `policy` and attach a signature from every member.
    pub fn sign(&self, policy: &SigningPolicy) -> Self {
        let mut next = self.clone();
        next.require(policy.key());
        for signer in policy.signers() {
            next.attach(signer);
        }
        debug!(
            transaction_id = %self.transaction_id(),
            signatures = next.signatures.len(),
            "signed with policy"
        );
        next
    }

    /// Register `policy` and attach one signature from `signer`.
    ///
    /// A signer outside the policy's member set is ignored: nothing is
    /// attached and the call still succeeds.
    pub fn sign_with(&self, policy: &SigningPolicy, signer: &Signer) -> Self {
        let mut next = self.clone();
        next.require(policy.key());
        if policy.admits(&signer.public_key()) {
            next.attach(signer);
        } else {
            debug!(
                transaction_id = %self.transaction_id(),
                public_key = %signer.public_key(),
                "ignoring signature from key outside policy"
            );
        }
        next
    }

    /// True iff every registered requirement is satisfied by the attached
    /// signatures.
    pub fn is_signed_enough(&self) -> bool {
        self.signature_shortfall().is_none()
    }

    /// The first unsatisfied requirement as `(required, provided)`.
    pub fn signature_shortfall(&self) -> Option<(usize, usize)> {
        let signed = self.signed_keys();
        self.requirements
            .iter()
            .find(|key| !key.is_satisfied_by(&signed))
            .map(|key| (key.required_count(), key.satisfied_count(&signed)))
    }

    /// Wire envelope with all attached signatures.
    pub fn to_signed(&self) -> SignedTransaction {
        SignedTransaction {
            body_bytes: self.core.body_bytes.clone(),
            signatures: self
                .signatures
                .iter()
                .map(|(public_key, signature)| SignaturePair {
                    public_key: *public_key,
                    signature: signature.clone(),
                })
                .collect(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.to_signed().to_bytes()
    }

    fn require(&mut self, key: Key) {
        if !self.requirements.contains(&key) {
            self.requirements.push(key);
        }
    }

    fn attach(&mut self, signer: &Signer) {
        let pair = signer.sign(&self.core.body_bytes);
        self.signatures.insert(pair.public_key, pair.signature);
    }
}
