//! Maintenance jobs that run outside the request path: the expired-code
//! purge split out of `recompute_stats` per the coupled-refresh design
//! note, and the reaper's pure liveness predicate.

use crate::repo::{TransferRepository, UserRepository};
use crate::types::Transfer;
use chrono::{DateTime, Duration, Utc};
use relay_crypto::HashedId;

/// Clear `identity`'s code if its expiry has passed. Called once per
/// reaper tick for any identity whose `recompute_stats` read reported
/// `code_expired`; never inline with the read itself.
pub async fn purge_expired_code(users: &dyn UserRepository, identity: &HashedId) -> crate::error::Result<()> {
    users.set_code(identity, None, None).await
}

/// The reaper's liveness predicate, exactly as pinned down against
/// properties 7 and 8: a live transfer is reapable when its expiry has
/// passed without ever being updated, or when its last update is more than
/// one minute stale.
pub fn is_reapable(transfer: &Transfer, now: DateTime<Utc>) -> bool {
    if !transfer.is_live() {
        return false;
    }
    let Some(expiry) = transfer.expiry else {
        return false;
    };
    match transfer.updated_at {
        None => expiry < now,
        Some(updated) => updated + Duration::minutes(1) <= now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn base_transfer() -> Transfer {
        Transfer {
            id: Uuid::new_v4(),
            sender: HashedId::from_stored("sender"),
            recipient: HashedId::from_stored("recipient"),
            object_name: Some("dir/file".into()),
            declared_size: 10,
            actual_size: Some(10),
            password: Some(vec![1]),
            expiry: Some(Utc::now() - Duration::minutes(5)),
            updated_at: None,
            finished_at: None,
            failed: false,
        }
    }

    #[test]
    fn never_updated_and_past_expiry_is_reapable() {
        let t = base_transfer();
        assert!(is_reapable(&t, Utc::now()));
    }

    #[test]
    fn never_updated_but_not_yet_expired_is_not_reapable() {
        let mut t = base_transfer();
        t.expiry = Some(Utc::now() + Duration::minutes(5));
        assert!(!is_reapable(&t, Utc::now()));
    }

    #[test]
    fn recently_updated_download_in_progress_is_not_reaped() {
        let mut t = base_transfer();
        t.updated_at = Some(Utc::now());
        assert!(!is_reapable(&t, Utc::now()));
    }

    #[test]
    fn stale_keep_alive_past_one_minute_is_reapable() {
        let mut t = base_transfer();
        t.updated_at = Some(Utc::now() - Duration::minutes(2));
        assert!(is_reapable(&t, Utc::now()));
    }

    #[test]
    fn finished_transfer_is_never_reapable() {
        let mut t = base_transfer();
        t.finished_at = Some(Utc::now());
        assert!(!is_reapable(&t, Utc::now()));
    }
}
