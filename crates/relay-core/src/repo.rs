//! Repository traits. `relay-core` only ever calls through these; it never
//! knows it is talking to Postgres. `relay-storage` provides the only
//! production implementation, against `sqlx::PgPool`.

use crate::error::Result;
use crate::types::{CreditGrant, Transfer, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_crypto::HashedId;
use uuid::Uuid;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get(&self, identity: &HashedId) -> Result<Option<User>>;

    async fn insert(&self, user: &User) -> Result<()>;

    /// Update the session timers (`wanted_minutes`, `registered_at` stays
    /// put) on an existing row, without touching the identity-key.
    async fn refresh_session(&self, identity: &HashedId, wanted_minutes: i64) -> Result<()>;

    /// Replace the stored identity-key digest. Only called when the
    /// stored value is empty (administrative reset).
    async fn rotate_identity_key(&self, identity: &HashedId, new_key: &HashedId) -> Result<()>;

    async fn set_code(
        &self,
        identity: &HashedId,
        code: Option<String>,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<()>;

    async fn set_connected(&self, identity: &HashedId, connected: bool) -> Result<()>;

    async fn find_by_code(&self, code: &str) -> Result<Option<User>>;
}

#[async_trait]
pub trait CreditRepository: Send + Sync {
    async fn get(&self, activation_code: &str) -> Result<Option<CreditGrant>>;

    /// Atomically bind an unowned grant to `owner`. Returns `Ok(false)`
    /// without mutating anything if the row was already owned, matching
    /// the single-row CAS style the core relies on throughout.
    async fn bind(&self, activation_code: &str, owner: &HashedId) -> Result<bool>;

    /// Sum of all credit grants owned by `owner`.
    async fn sum_credit(&self, owner: &HashedId) -> Result<i64>;

    async fn set_permanent_code(&self, owner: &HashedId, code: Option<String>) -> Result<()>;

    async fn set_custom_code(&self, owner: &HashedId, code: Option<String>) -> Result<()>;

    /// `true` if `code` collides with any stored ephemeral, permanent, or
    /// custom code across the whole user base.
    async fn is_code_taken(&self, code: &str) -> Result<bool>;

    /// `(permanent_code, custom_code)` currently held by `owner`, across
    /// whichever grant row carries them. Used to decide the toggle
    /// direction without the caller having to track this itself.
    async fn current_codes(&self, owner: &HashedId) -> Result<(Option<String>, Option<String>)>;
}

#[async_trait]
pub trait TransferRepository: Send + Sync {
    /// The live transfer (`finished IS NULL`) for this sender/recipient
    /// pair, if one exists. At most one such row may exist at a time.
    async fn find_live(&self, sender: &HashedId, recipient: &HashedId) -> Result<Option<Transfer>>;

    async fn insert_reserved(&self, transfer: &Transfer) -> Result<()>;

    /// Drive a row to FAILED (cancellation path). Returns `false` if the
    /// row was already terminal — callers treat that as idempotent-already.
    async fn fail(&self, id: Uuid) -> Result<bool>;

    /// Commit phase 2: set object name, actual size, password and new
    /// expiry. Returns `false` if the ticket-gated row was not RESERVED
    /// (should not happen if the ticket was honored, but the caller treats
    /// a `false` as `NoTicket` rather than trusting its own state).
    #[allow(clippy::too_many_arguments)]
    async fn commit(
        &self,
        id: Uuid,
        object_name: String,
        actual_size: i64,
        password: Vec<u8>,
        expiry: DateTime<Utc>,
    ) -> Result<bool>;

    /// Find a non-finished transfer matching `recipient` and `object_name`,
    /// the authorization check shared by `/download` and
    /// `/completed-download`.
    async fn find_for_download(
        &self,
        recipient: &HashedId,
        object_name: &str,
    ) -> Result<Option<Transfer>>;

    /// Drive a row to FINISHED. Returns the row as it was *before* this
    /// call if this call performed the transition, or `None` if the row
    /// was already terminal (idempotent-already: CompletedDownload and the
    /// reaper race for this and the loser sees `None`).
    async fn finish(&self, id: Uuid, failed: bool) -> Result<Option<Transfer>>;

    /// Keep-alive: bump `updated_at` to now for the matching live transfer.
    async fn touch(&self, recipient: &HashedId, object_name: &str) -> Result<bool>;

    /// Sum of `actual_size` for transfers sent by `sender` that finished
    /// successfully since the start of the current UTC day.
    async fn bandwidth_sent_today(&self, sender: &HashedId) -> Result<i64>;

    /// The reaper's sweep: all live rows matching the expiry predicate
    /// from the design notes.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<Vec<Transfer>>;
}
