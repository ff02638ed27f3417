//! Identity & tier ledger (C1): registration, credential validation, and
//! the derived-stats read path.

use crate::code::allocate_ephemeral;
use crate::error::{RelayError, Result};
use crate::repo::{CreditRepository, TransferRepository, UserRepository};
use crate::tier::{bandwidth_quota, max_file_size, minutes_allowed, tier_for_credit};
use crate::types::{AccountStats, User};
use chrono::{Duration, Utc};
use relay_crypto::{digests_match, HashedId};

/// Outcome of [`register`]: a freshly minted identity-key on first
/// registration (the client must persist it, it is never shown again), or
/// nothing when an existing session was simply refreshed.
pub enum RegisterOutcome {
    Created { identity_key: HashedId },
    Refreshed,
}

/// *Register*(identity, public key, desired minutes).
///
/// - New identity: creates the row with a freshly minted identity-key.
/// - Existing identity, matching identity-key: refreshes session timers.
/// - Existing identity, stored identity-key is empty (administrative
///   reset): re-mints the key, once.
/// - Existing identity, stored identity-key present and non-matching:
///   `IdentityKeyMismatch`.
pub async fn register(
    users: &dyn UserRepository,
    identity: &HashedId,
    presented_identity_key: Option<&HashedId>,
    public_key: Vec<u8>,
    wanted_minutes: i64,
) -> Result<RegisterOutcome> {
    match users.get(identity).await? {
        None => {
            let identity_key = presented_identity_key
                .cloned()
                .unwrap_or_else(|| HashedId::from_stored(uuid::Uuid::new_v4().to_string()));
            let user = User {
                identity: identity.clone(),
                identity_key: identity_key.clone(),
                public_key,
                code: None,
                code_expiry: None,
                wanted_minutes,
                registered_at: Utc::now(),
                connected: false,
            };
            users.insert(&user).await?;
            Ok(RegisterOutcome::Created { identity_key })
        }
        Some(existing) if existing.identity_key_is_reset() => {
            let identity_key = presented_identity_key
                .cloned()
                .unwrap_or_else(|| HashedId::from_stored(uuid::Uuid::new_v4().to_string()));
            users
                .rotate_identity_key(identity, &identity_key)
                .await?;
            users.refresh_session(identity, wanted_minutes).await?;
            Ok(RegisterOutcome::Created { identity_key })
        }
        Some(existing) => {
            let presented = presented_identity_key.ok_or(RelayError::IdentityKeyMismatch)?;
            if !digests_match(&existing.identity_key, presented) {
                return Err(RelayError::IdentityKeyMismatch);
            }
            users.refresh_session(identity, wanted_minutes).await?;
            Ok(RegisterOutcome::Refreshed)
        }
    }
}

/// *Validate*(identity, identity-key) — constant-time digest comparison
/// against the stored value.
pub async fn validate(
    users: &dyn UserRepository,
    identity: &HashedId,
    presented_identity_key: &HashedId,
) -> Result<bool> {
    match users.get(identity).await? {
        Some(user) => Ok(digests_match(&user.identity_key, presented_identity_key)),
        None => Ok(false),
    }
}

/// *RecomputeStats*(identity): refresh {tier, minutes-allowed,
/// bandwidth-left-today, max-file-size, code-expiry}. Does not purge an
/// expired code itself — returns `code_expired` for the caller (or the
/// maintenance job) to act on, per the coupled-refresh design note.
pub async fn recompute_stats(
    users: &dyn UserRepository,
    credits: &dyn CreditRepository,
    transfers: &dyn TransferRepository,
    identity: &HashedId,
) -> Result<AccountStats> {
    let user = users
        .get(identity)
        .await?
        .ok_or_else(|| RelayError::Internal("recompute_stats on unknown identity".into()))?;

    let credit = credits.sum_credit(identity).await?;
    let sent_today = transfers.bandwidth_sent_today(identity).await?;

    let code_expired = match (&user.code, user.code_expiry) {
        (Some(_), Some(expiry)) => expiry < Utc::now(),
        _ => false,
    };

    Ok(AccountStats {
        tier: tier_for_credit(credit),
        minutes_allowed: minutes_allowed(credit),
        bandwidth_left_today: (bandwidth_quota(credit) - sent_today).max(0),
        max_file_size: max_file_size(credit),
        code_expiry: user.code_expiry,
        code_expired,
    })
}

/// *BindCredit*(identity, activation code): atomic transition from
/// unowned to owned.
pub async fn bind_credit(
    credits: &dyn CreditRepository,
    identity: &HashedId,
    activation_code: &str,
) -> Result<()> {
    let grant = credits
        .get(activation_code)
        .await?
        .ok_or(RelayError::NoSuchCredit)?;
    if grant.owner.is_some() {
        return Err(RelayError::CreditAlreadyBound);
    }
    if !credits.bind(activation_code, identity).await? {
        return Err(RelayError::CreditAlreadyBound);
    }
    Ok(())
}

/// Ensure a live ephemeral code exists for `identity`, issuing one if the
/// current code is absent or expired. Used by `/code` (register/refresh)
/// and distinct from the permanent/custom allocator in [`crate::code`].
pub async fn ensure_ephemeral_code(
    users: &dyn UserRepository,
    credits: &dyn CreditRepository,
    identity: &HashedId,
    wanted_minutes: i64,
    expected_permanent_code: Option<&str>,
) -> Result<String> {
    if let Some(expected) = expected_permanent_code {
        // If the presented "expected permanent code" matches a stored
        // permanent/custom code, the ephemeral slot is overwritten with it
        // rather than minting a fresh ephemeral code.
        if credits.is_code_taken(expected).await? {
            users
                .set_code(identity, Some(expected.to_string()), None)
                .await?;
            return Ok(expected.to_string());
        }
    }

    let code = allocate_ephemeral(credits).await?;
    let expiry = Utc::now() + Duration::minutes(wanted_minutes);
    users
        .set_code(identity, Some(code.clone()), Some(expiry))
        .await?;
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CreditGrant;
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::sync::Mutex;

    struct FakeUsers {
        rows: Mutex<Vec<User>>,
    }

    #[async_trait]
    impl UserRepository for FakeUsers {
        async fn get(&self, identity: &HashedId) -> Result<Option<User>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.identity == *identity)
                .cloned())
        }
        async fn insert(&self, user: &User) -> Result<()> {
            self.rows.lock().unwrap().push(user.clone());
            Ok(())
        }
        async fn refresh_session(&self, identity: &HashedId, wanted_minutes: i64) -> Result<()> {
            if let Some(u) = self
                .rows
                .lock()
                .unwrap()
                .iter_mut()
                .find(|u| u.identity == *identity)
            {
                u.wanted_minutes = wanted_minutes;
            }
            Ok(())
        }
        async fn rotate_identity_key(&self, identity: &HashedId, new_key: &HashedId) -> Result<()> {
            if let Some(u) = self
                .rows
                .lock()
                .unwrap()
                .iter_mut()
                .find(|u| u.identity == *identity)
            {
                u.identity_key = new_key.clone();
            }
            Ok(())
        }
        async fn set_code(
            &self,
            identity: &HashedId,
            code: Option<String>,
            expiry: Option<DateTime<Utc>>,
        ) -> Result<()> {
            if let Some(u) = self
                .rows
                .lock()
                .unwrap()
                .iter_mut()
                .find(|u| u.identity == *identity)
            {
                u.code = code;
                u.code_expiry = expiry;
            }
            Ok(())
        }
        async fn set_connected(&self, _identity: &HashedId, _connected: bool) -> Result<()> {
            Ok(())
        }
        async fn find_by_code(&self, code: &str) -> Result<Option<User>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.code.as_deref() == Some(code))
                .cloned())
        }
    }

    fn empty_users() -> FakeUsers {
        FakeUsers {
            rows: Mutex::new(vec![]),
        }
    }

    #[tokio::test]
    async fn register_new_identity_mints_a_key() {
        let users = empty_users();
        let identity = HashedId::from_stored("alice");
        let outcome = register(&users, &identity, None, vec![1, 2, 3], 10)
            .await
            .unwrap();
        assert!(matches!(outcome, RegisterOutcome::Created { .. }));
    }

    #[tokio::test]
    async fn register_existing_identity_with_matching_key_refreshes() {
        let users = empty_users();
        let identity = HashedId::from_stored("alice");
        let RegisterOutcome::Created { identity_key } =
            register(&users, &identity, None, vec![1], 10).await.unwrap()
        else {
            panic!("expected Created");
        };

        let outcome = register(&users, &identity, Some(&identity_key), vec![1], 20)
            .await
            .unwrap();
        assert!(matches!(outcome, RegisterOutcome::Refreshed));
    }

    #[tokio::test]
    async fn register_existing_identity_with_wrong_key_fails() {
        let users = empty_users();
        let identity = HashedId::from_stored("alice");
        register(&users, &identity, None, vec![1], 10).await.unwrap();

        let err = register(
            &users,
            &identity,
            Some(&HashedId::from_stored("wrong-key")),
            vec![1],
            10,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RelayError::IdentityKeyMismatch));
    }

    #[tokio::test]
    async fn register_with_reset_identity_key_remints() {
        let users = empty_users();
        let identity = HashedId::from_stored("alice");
        users
            .insert(&User {
                identity: identity.clone(),
                identity_key: HashedId::from_stored(""),
                public_key: vec![],
                code: None,
                code_expiry: None,
                wanted_minutes: 10,
                registered_at: Utc::now(),
                connected: false,
            })
            .await
            .unwrap();

        let outcome = register(&users, &identity, None, vec![], 10).await.unwrap();
        assert!(matches!(outcome, RegisterOutcome::Created { .. }));
    }

    struct FakeCredits;

    #[async_trait]
    impl CreditRepository for FakeCredits {
        async fn get(&self, _activation_code: &str) -> Result<Option<CreditGrant>> {
            Ok(None)
        }
        async fn bind(&self, _activation_code: &str, _owner: &HashedId) -> Result<bool> {
            Ok(true)
        }
        async fn sum_credit(&self, _owner: &HashedId) -> Result<i64> {
            Ok(0)
        }
        async fn set_permanent_code(&self, _owner: &HashedId, _code: Option<String>) -> Result<()> {
            Ok(())
        }
        async fn set_custom_code(&self, _owner: &HashedId, _code: Option<String>) -> Result<()> {
            Ok(())
        }
        async fn is_code_taken(&self, _code: &str) -> Result<bool> {
            Ok(false)
        }
        async fn current_codes(&self, _owner: &HashedId) -> Result<(Option<String>, Option<String>)> {
            Ok((None, None))
        }
    }

    #[tokio::test]
    async fn bind_credit_fails_for_unknown_code() {
        let err = bind_credit(&FakeCredits, &HashedId::from_stored("alice"), "NOPE")
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::NoSuchCredit));
    }
}
