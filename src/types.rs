//! Core value types shared by the transaction pipeline and the network seam.
//!
//! Identifiers follow the ledger's `shard.realm.num` notation and serialize as
//! strings so transaction bodies and fixture files stay human-readable.

use core::fmt;
use core::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{HarnessError, Result};

/// A `shard.realm.num` ledger entity identifier.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    pub shard: u64,
    pub realm: u64,
    pub num: u64,
}

impl EntityId {
    /// Create a new entity id.
    pub const fn new(shard: u64, realm: u64, num: u64) -> Self {
        Self { shard, realm, num }
    }
}

impl FromStr for EntityId {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || HarnessError::InvalidEntityId {
            input: s.to_string(),
        };

        let mut parts = s.trim().split('.');
        let mut next = || -> Result<u64> {
            parts
                .next()
                .and_then(|p| p.parse::<u64>().ok())
                .ok_or_else(invalid)
        };
        let (shard, realm, num) = (next()?, next()?, next()?);

        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self::new(shard, realm, num))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(EntityId);

        impl $name {
            /// Create an id from its three components.
            pub const fn new(shard: u64, realm: u64, num: u64) -> Self {
                Self(EntityId::new(shard, realm, num))
            }

            /// Create an id in shard 0, realm 0.
            pub const fn from_num(num: u64) -> Self {
                Self(EntityId::new(0, 0, num))
            }

            /// The underlying entity id.
            pub fn entity(&self) -> EntityId {
                self.0
            }

            /// The entity number.
            pub fn num(&self) -> u64 {
                self.0.num
            }
        }

        impl From<EntityId> for $name {
            fn from(id: EntityId) -> Self {
                Self(id)
            }
        }

        impl FromStr for $name {
            type Err = HarnessError;

            fn from_str(s: &str) -> Result<Self> {
                s.parse::<EntityId>().map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

entity_id!(
    /// Account identifier (an address that holds hbars and tokens).
    AccountId
);
entity_id!(
    /// Fungible token identifier.
    TokenId
);
entity_id!(
    /// Consensus topic identifier.
    TopicId
);

/// Tinybars per hbar.
pub const TINYBARS_PER_HBAR: i64 = 100_000_000;

/// An amount of the ledger's native currency, held in tinybars.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hbar(i64);

impl Hbar {
    /// Zero hbars.
    pub const ZERO: Hbar = Hbar(0);

    /// Create an amount from tinybars.
    pub const fn from_tinybars(tinybars: i64) -> Self {
        Self(tinybars)
    }

    /// Create an amount from whole hbars.
    pub const fn from_hbars(hbars: i64) -> Self {
        Self(hbars * TINYBARS_PER_HBAR)
    }

    /// Amount in tinybars.
    pub fn to_tinybars(&self) -> i64 {
        self.0
    }

    /// Whole hbars, truncated toward zero.
    pub fn whole_hbars(&self) -> i64 {
        self.0 / TINYBARS_PER_HBAR
    }

    /// Negated amount (for the debit side of a transfer).
    pub fn negated(&self) -> Self {
        Self(-self.0)
    }

    pub fn checked_add(self, rhs: Hbar) -> Option<Hbar> {
        self.0.checked_add(rhs.0).map(Hbar)
    }

    pub fn checked_sub(self, rhs: Hbar) -> Option<Hbar> {
        self.0.checked_sub(rhs.0).map(Hbar)
    }
}

impl fmt::Display for Hbar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per = TINYBARS_PER_HBAR as u64;
        write!(f, "{}{}.{:08} ℏ", sign, abs / per, abs % per)
    }
}

/// A consensus or wall-clock timestamp with nanosecond precision.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: u32,
}

impl Timestamp {
    const NANOS_PER_SECOND: i64 = 1_000_000_000;

    /// Build a timestamp from nanoseconds since the Unix epoch.
    pub fn from_unix_nanos(nanos: i64) -> Self {
        Self {
            seconds: nanos.div_euclid(Self::NANOS_PER_SECOND),
            nanos: nanos.rem_euclid(Self::NANOS_PER_SECOND) as u32,
        }
    }

    /// Nanoseconds since the Unix epoch.
    pub fn to_unix_nanos(&self) -> i64 {
        self.seconds * Self::NANOS_PER_SECOND + self.nanos as i64
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(0);
        Self::from_unix_nanos(nanos)
    }

    /// This timestamp shifted by `nanos`.
    pub fn plus_nanos(&self, nanos: i64) -> Self {
        Self::from_unix_nanos(self.to_unix_nanos() + nanos)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanos)
    }
}

/// Valid-start backdating applied to fresh transaction ids, in nanoseconds.
/// Absorbs small clock drift between the harness and the nodes.
const VALID_START_BACKDATE_NANOS: i64 = 5_000_000_000;

static LAST_VALID_START: AtomicI64 = AtomicI64::new(0);

/// Transaction identifier: the paying account plus a valid-start timestamp.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionId {
    pub account_id: AccountId,
    pub valid_start: Timestamp,
}

impl TransactionId {
    /// Create a transaction id from explicit components.
    pub fn new(account_id: AccountId, valid_start: Timestamp) -> Self {
        Self {
            account_id,
            valid_start,
        }
    }

    /// Generate a fresh id for `account_id`.
    ///
    /// Valid starts are strictly increasing across the whole process, so two
    /// ids generated in the same nanosecond never collide.
    pub fn generate(account_id: AccountId) -> Self {
        let candidate = Timestamp::now().to_unix_nanos() - VALID_START_BACKDATE_NANOS;
        let previous = LAST_VALID_START
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(candidate.max(last + 1))
            })
            .unwrap_or(candidate);
        let nanos = candidate.max(previous + 1);

        Self::new(account_id, Timestamp::from_unix_nanos(nanos))
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.account_id, self.valid_start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_round_trip() {
        let id: AccountId = "0.0.1234".parse().unwrap();
        assert_eq!(id, AccountId::from_num(1234));
        assert_eq!(id.to_string(), "0.0.1234");
    }

    #[test]
    fn test_entity_id_rejects_bad_input() {
        assert!("0.0".parse::<TokenId>().is_err());
        assert!("0.0.1.2".parse::<TokenId>().is_err());
        assert!("0.0.x".parse::<TopicId>().is_err());
        assert!("".parse::<TopicId>().is_err());
    }

    #[test]
    fn test_entity_id_serializes_as_string() {
        let json = serde_json::to_string(&TopicId::from_num(7)).unwrap();
        assert_eq!(json, "\"0.0.7\"");
    }

    #[test]
    fn test_hbar_display_and_whole() {
        let amount = Hbar::from_tinybars(150_000_000);
        assert_eq!(amount.whole_hbars(), 1);
        assert_eq!(amount.to_string(), "1.50000000 ℏ");
        assert_eq!(Hbar::from_hbars(-2).to_string(), "-2.00000000 ℏ");
    }

    #[test]
    fn test_transaction_ids_are_unique() {
        let account = AccountId::from_num(2);
        let a = TransactionId::generate(account);
        let b = TransactionId::generate(account);
        assert_ne!(a, b);
        assert!(b.valid_start > a.valid_start);
    }

    #[test]
    fn test_timestamp_nanos_round_trip() {
        let ts = Timestamp::from_unix_nanos(1_700_000_000_123_456_789);
        assert_eq!(ts.seconds, 1_700_000_000);
        assert_eq!(ts.nanos, 123_456_789);
        assert_eq!(ts.to_string(), "1700000000.123456789");
    }
}
