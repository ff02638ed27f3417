//! Core type definitions for the relay broker domain: users, credit
//! grants, transfers, tiers and the push message envelope.

use chrono::{DateTime, Utc};
use relay_crypto::HashedId;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A registered device/user, keyed by its identity digest.
///
/// Invariants: `(public_key, identity)` is immutable after first
/// registration unless explicitly rotated; `code.is_some()` implies either
/// `code_expiry > now` or the code is the permanent/custom one stored on a
/// credit row.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    /// Primary key: `base64(SHA-256(raw identity))`.
    pub identity: HashedId,
    /// Bearer credential digest; rotated only when stored value is empty.
    pub identity_key: HashedId,
    /// Opaque DER SubjectPublicKeyInfo bytes, validated at the boundary.
    pub public_key: Vec<u8>,
    /// Current rendezvous code, if any (ephemeral, permanent, or custom).
    pub code: Option<String>,
    /// Expiry instant for an ephemeral code. Permanent/custom codes carry
    /// no expiry and this is `None` for them.
    pub code_expiry: Option<DateTime<Utc>>,
    /// Desired ephemeral-code lifetime in minutes, chosen by the client.
    pub wanted_minutes: i64,
    pub registered_at: DateTime<Utc>,
    pub connected: bool,
}

impl User {
    /// `true` if the stored identity-key digest is empty, i.e. the account
    /// was administratively reset and is eligible for a one-time re-mint.
    pub fn identity_key_is_reset(&self) -> bool {
        self.identity_key.as_str().is_empty()
    }
}

/// A one-time activation code granting credit to whichever user redeems it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreditGrant {
    /// Primary key, presented once by the user claiming the grant.
    pub activation_code: String,
    pub amount: i64,
    /// Identity digest of the owner, `None` until redeemed.
    pub owner: Option<HashedId>,
    pub activated_at: Option<DateTime<Utc>>,
    /// A permanent rendezvous code bound to this grant, if minted.
    pub permanent_code: Option<String>,
    /// A user-chosen custom rendezvous code bound to this grant, if set.
    pub custom_code: Option<String>,
}

/// Account tier, derived from cumulative credit. Ordered: higher tiers
/// strictly dominate the quotas and features of lower ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    Free,
    Paid,
    PermCode,
    CustomCode,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tier::Free => "free",
            Tier::Paid => "paid",
            Tier::PermCode => "perm_code",
            Tier::CustomCode => "custom_code",
        };
        write!(f, "{s}")
    }
}

/// Derived account stats, recomputed on demand from primitive rows. Nothing
/// here is denormalized storage — this is a read-side view.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountStats {
    pub tier: Tier,
    pub minutes_allowed: i64,
    pub bandwidth_left_today: i64,
    pub max_file_size: i64,
    pub code_expiry: Option<DateTime<Utc>>,
    /// `true` if the caller's stored code has passed its expiry and should
    /// be purged by the maintenance job; never purged inline here.
    pub code_expired: bool,
}

/// A transfer row. The lifecycle state (RESERVED/COMMITTED/FINISHED/FAILED)
/// is derived from these fields rather than stored as an explicit enum
/// column, matching the original data model.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transfer {
    pub id: Uuid,
    pub sender: HashedId,
    pub recipient: HashedId,
    pub object_name: Option<String>,
    pub declared_size: i64,
    pub actual_size: Option<i64>,
    /// Encrypted-for-recipient password blob; opaque to the broker.
    pub password: Option<Vec<u8>>,
    pub expiry: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub failed: bool,
}

/// The lifecycle state derived from a [`Transfer`] row's fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferState {
    Reserved,
    Committed,
    Finished,
    Failed,
}

impl Transfer {
    /// A transfer is *live* while `finished IS NULL`; see data-model
    /// invariant 1 (one live transfer per sender/recipient pair).
    pub fn is_live(&self) -> bool {
        self.finished_at.is_none()
    }

    pub fn state(&self) -> TransferState {
        if self.finished_at.is_some() {
            if self.failed {
                TransferState::Failed
            } else {
                TransferState::Finished
            }
        } else if self.object_name.is_some() {
            TransferState::Committed
        } else {
            TransferState::Reserved
        }
    }
}

/// The opaque capability proving phase 1 completed; carried in a signed
/// session cookie, single-use.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadTicket {
    pub transfer_id: Uuid,
    pub sender: HashedId,
    pub recipient: HashedId,
    pub declared_size: i64,
    pub expiry: DateTime<Utc>,
    /// Random per-ticket value so two tickets for the same transfer never
    /// collide if a caller somehow mints two (defense in depth; phase 1
    /// only ever mints one ticket per RESERVED row).
    pub nonce: [u8; 16],
}

/// Tagged union of push notifications delivered over a funnel.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PushMessage {
    UserStatsUpdate { stats: AccountStats },
    DownloadAvailable { object_name: String },
    Notice { title: String, body: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_transfer() -> Transfer {
        Transfer {
            id: Uuid::new_v4(),
            sender: HashedId::from_stored("sender-digest"),
            recipient: HashedId::from_stored("recipient-digest"),
            object_name: None,
            declared_size: 1024,
            actual_size: None,
            password: None,
            expiry: None,
            updated_at: None,
            finished_at: None,
            failed: false,
        }
    }

    #[test]
    fn reserved_transfer_is_live_and_has_no_object() {
        let t = sample_transfer();
        assert!(t.is_live());
        assert_eq!(t.state(), TransferState::Reserved);
    }

    #[test]
    fn committed_transfer_has_object_name_and_is_live() {
        let mut t = sample_transfer();
        t.object_name = Some("dir/file.bin".into());
        assert!(t.is_live());
        assert_eq!(t.state(), TransferState::Committed);
    }

    #[test]
    fn finished_without_failed_is_finished_state() {
        let mut t = sample_transfer();
        t.finished_at = Some(Utc::now());
        assert!(!t.is_live());
        assert_eq!(t.state(), TransferState::Finished);
    }

    #[test]
    fn finished_with_failed_is_failed_state() {
        let mut t = sample_transfer();
        t.finished_at = Some(Utc::now());
        t.failed = true;
        assert_eq!(t.state(), TransferState::Failed);
    }

    #[test]
    fn tier_ordering_is_free_lt_paid_lt_perm_lt_custom() {
        assert!(Tier::Free < Tier::Paid);
        assert!(Tier::Paid < Tier::PermCode);
        assert!(Tier::PermCode < Tier::CustomCode);
    }
}
