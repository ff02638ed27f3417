//! Transfer state machine (C4): the two-phase upload protocol, download,
//! completion, keep-alive, and the concurrency invariants that bind them.

use crate::error::{RelayError, Result};
use crate::identity::recompute_stats;
use crate::notify::Notifier;
use crate::repo::{CreditRepository, TransferRepository, UserRepository};
use crate::types::{PushMessage, Transfer, UploadTicket};
use chrono::{Duration, Utc};
use rand::RngCore;
use relay_crypto::HashedId;
use uuid::Uuid;

/// Result of [`init_upload`]: the new RESERVED row's ticket, and the
/// recipient's public key for the sender to wrap a symmetric key against.
pub struct InitUploadResult {
    pub ticket: UploadTicket,
    pub recipient_public_key: Vec<u8>,
}

/// Phase 1 — *InitUpload*(sender creds, recipient code, declared size).
///
/// Resolves the recipient from their live code, enforces quotas,
/// supersedes any existing live transfer to the same recipient (publishing
/// a cancellation notice to the sender *before* inserting the new row, so
/// the sender's funnel always sees the old transfer die first), then
/// reserves a new row and mints its ticket.
pub async fn init_upload(
    users: &dyn UserRepository,
    credits: &dyn CreditRepository,
    transfers: &dyn TransferRepository,
    notifier: &dyn Notifier,
    sender: &HashedId,
    recipient_code: &str,
    declared_size: i64,
) -> Result<InitUploadResult> {
    if declared_size <= 0 {
        return Err(RelayError::BadSize);
    }

    let recipient_user = users
        .find_by_code(recipient_code)
        .await?
        .ok_or(RelayError::NoSuchRecipient)?;

    if recipient_user.identity == *sender {
        return Err(RelayError::SelfTransfer);
    }

    let stats = recompute_stats(users, credits, transfers, sender).await?;
    if declared_size > stats.bandwidth_left_today {
        return Err(RelayError::OverBandwidth);
    }
    if declared_size > stats.max_file_size {
        return Err(RelayError::OverFileSize);
    }

    if let Some(existing) = transfers.find_live(sender, &recipient_user.identity).await? {
        if transfers.fail(existing.id).await? {
            notifier
                .send(
                    sender,
                    PushMessage::Notice {
                        title: "Cancelled Transfer".into(),
                        body: "A new transfer replaced this one.".into(),
                    },
                )
                .await?;
        }
    }

    let transfer = Transfer {
        id: Uuid::new_v4(),
        sender: sender.clone(),
        recipient: recipient_user.identity.clone(),
        object_name: None,
        declared_size,
        actual_size: None,
        password: None,
        expiry: None,
        updated_at: None,
        finished_at: None,
        failed: false,
    };
    transfers.insert_reserved(&transfer).await?;

    let mut nonce = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut nonce);
    let ticket = UploadTicket {
        transfer_id: transfer.id,
        sender: sender.clone(),
        recipient: recipient_user.identity.clone(),
        declared_size,
        expiry: Utc::now() + Duration::minutes(10),
        nonce,
    };

    Ok(InitUploadResult {
        ticket,
        recipient_public_key: recipient_user.public_key,
    })
}

/// Phase 2 — *UploadBody*(ticket, encrypted password blob, file bytes).
///
/// The ticket is consumed by the caller before this is invoked (single-use
/// enforcement lives at the session-store boundary in `relay-server`); this
/// function only validates the size invariant and performs the COMMITTED
/// transition. `object_name` must already have been written to the object
/// store by the caller — this only updates the row.
pub async fn upload_body(
    transfers: &dyn TransferRepository,
    notifier: &dyn Notifier,
    ticket: &UploadTicket,
    object_name: String,
    actual_size: i64,
    password: Vec<u8>,
    wanted_minutes: i64,
) -> Result<()> {
    if actual_size > ticket.declared_size {
        return Err(RelayError::SizeLied);
    }

    let expiry = Utc::now() + Duration::minutes(wanted_minutes);
    let committed = transfers
        .commit(ticket.transfer_id, object_name.clone(), actual_size, password, expiry)
        .await?;
    if !committed {
        return Err(RelayError::NoTicket);
    }

    notifier
        .send(
            &ticket.recipient,
            PushMessage::DownloadAvailable { object_name },
        )
        .await?;
    Ok(())
}

/// *DownloadObject*(recipient creds, object name): authorize only; the
/// caller streams the blob from the object store once this returns `Ok`.
pub async fn authorize_download(
    transfers: &dyn TransferRepository,
    recipient: &HashedId,
    object_name: &str,
) -> Result<Transfer> {
    transfers
        .find_for_download(recipient, object_name)
        .await?
        .ok_or(RelayError::NotAuthorized)
}

/// *CompletedDownload*(recipient creds, object name): authorize, drive to
/// FINISHED, and return the encrypted password. The caller deletes the
/// blob from the object store after this returns `Ok`. Publishes a
/// refreshed stats snapshot and a success notice to the sender.
pub async fn completed_download(
    users: &dyn UserRepository,
    credits: &dyn CreditRepository,
    transfers: &dyn TransferRepository,
    notifier: &dyn Notifier,
    recipient: &HashedId,
    object_name: &str,
) -> Result<Vec<u8>> {
    let transfer = transfers
        .find_for_download(recipient, object_name)
        .await?
        .ok_or(RelayError::AlreadyFinalized)?;

    let password = transfer.password.clone().ok_or(RelayError::AlreadyFinalized)?;

    match transfers.finish(transfer.id, false).await? {
        Some(_) => {
            let stats = recompute_stats(users, credits, transfers, &transfer.sender).await?;
            notifier
                .send(&transfer.sender, PushMessage::UserStatsUpdate { stats })
                .await?;
            notifier
                .send(
                    &transfer.sender,
                    PushMessage::Notice {
                        title: "Successful Transfer".into(),
                        body: "Your file was downloaded.".into(),
                    },
                )
                .await?;
            Ok(password)
        }
        // Another actor (the reaper) already finished this row; per
        // property 4 (terminal idempotence) this is not an error, but
        // there is no second password to hand out.
        None => Err(RelayError::AlreadyFinalized),
    }
}

/// Keep-alive: a recipient's periodic heartbeat for an in-progress
/// download, naming the object under transfer. Suppresses reaping by
/// bumping `updated_at`.
pub async fn keep_alive(
    transfers: &dyn TransferRepository,
    recipient: &HashedId,
    object_name: &str,
) -> Result<()> {
    transfers.touch(recipient, object_name).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::UserRepository;
    use crate::types::{CreditGrant, User};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FakeUsers {
        rows: Mutex<Vec<User>>,
    }

    #[async_trait]
    impl UserRepository for FakeUsers {
        async fn get(&self, identity: &HashedId) -> Result<Option<User>> {
            Ok(self.rows.lock().unwrap().iter().find(|u| u.identity == *identity).cloned())
        }
        async fn insert(&self, user: &User) -> Result<()> {
            self.rows.lock().unwrap().push(user.clone());
            Ok(())
        }
        async fn refresh_session(&self, _identity: &HashedId, _wanted_minutes: i64) -> Result<()> {
            Ok(())
        }
        async fn rotate_identity_key(&self, _identity: &HashedId, _new_key: &HashedId) -> Result<()> {
            Ok(())
        }
        async fn set_code(
            &self,
            _identity: &HashedId,
            _code: Option<String>,
            _expiry: Option<chrono::DateTime<Utc>>,
        ) -> Result<()> {
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

    #[derive(Default)]
    struct FakeTransfers {
        rows: Mutex<Vec<Transfer>>,
    }

    #[async_trait]
    impl TransferRepository for FakeTransfers {
        async fn find_live(&self, sender: &HashedId, recipient: &HashedId) -> Result<Option<Transfer>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|t| t.sender == *sender && t.recipient == *recipient && t.is_live())
                .cloned())
        }
        async fn insert_reserved(&self, transfer: &Transfer) -> Result<()> {
            self.rows.lock().unwrap().push(transfer.clone());
            Ok(())
        }
        async fn fail(&self, id: Uuid) -> Result<bool> {
            let mut rows = self.rows.lock().unwrap();
            if let Some(t) = rows.iter_mut().find(|t| t.id == id && t.is_live()) {
                t.finished_at = Some(Utc::now());
                t.failed = true;
                Ok(true)
            } else {
                Ok(false)
            }
        }
        async fn commit(
            &self,
            id: Uuid,
            object_name: String,
            actual_size: i64,
            password: Vec<u8>,
            expiry: chrono::DateTime<Utc>,
        ) -> Result<bool> {
            let mut rows = self.rows.lock().unwrap();
            if let Some(t) = rows.iter_mut().find(|t| t.id == id && t.is_live() && t.object_name.is_none()) {
                t.object_name = Some(object_name);
                t.actual_size = Some(actual_size);
                t.password = Some(password);
                t.expiry = Some(expiry);
                t.updated_at = Some(Utc::now());
                Ok(true)
            } else {
                Ok(false)
            }
        }
        async fn find_for_download(&self, recipient: &HashedId, object_name: &str) -> Result<Option<Transfer>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|t| {
                    t.recipient == *recipient
                        && t.object_name.as_deref() == Some(object_name)
                        && t.is_live()
                })
                .cloned())
        }
        async fn finish(&self, id: Uuid, failed: bool) -> Result<Option<Transfer>> {
            let mut rows = self.rows.lock().unwrap();
            if let Some(t) = rows.iter_mut().find(|t| t.id == id && t.is_live()) {
                let before = t.clone();
                t.finished_at = Some(Utc::now());
                t.failed = failed;
                t.object_name = None;
                t.password = None;
                Ok(Some(before))
            } else {
                Ok(None)
            }
        }
        async fn touch(&self, recipient: &HashedId, object_name: &str) -> Result<bool> {
            let mut rows = self.rows.lock().unwrap();
            if let Some(t) = rows.iter_mut().find(|t| {
                t.recipient == *recipient && t.object_name.as_deref() == Some(object_name) && t.is_live()
            }) {
                t.updated_at = Some(Utc::now());
                Ok(true)
            } else {
                Ok(false)
            }
        }
        async fn bandwidth_sent_today(&self, _sender: &HashedId) -> Result<i64> {
            Ok(0)
        }
        async fn sweep_expired(&self, _now: chrono::DateTime<Utc>) -> Result<Vec<Transfer>> {
            Ok(vec![])
        }
    }

    struct RecordingNotifier {
        sent: Mutex<Vec<(HashedId, PushMessage)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, identity: &HashedId, message: PushMessage) -> Result<()> {
            self.sent.lock().unwrap().push((identity.clone(), message));
            Ok(())
        }
    }

    fn sample_user(identity: &str, code: &str) -> User {
        User {
            identity: HashedId::from_stored(identity),
            identity_key: HashedId::from_stored("key"),
            public_key: vec![9, 9, 9],
            code: Some(code.to_string()),
            code_expiry: None,
            wanted_minutes: 10,
            registered_at: Utc::now(),
            connected: false,
        }
    }

    #[tokio::test]
    async fn self_transfer_is_rejected() {
        let users = FakeUsers {
            rows: Mutex::new(vec![sample_user("alice", "CODE123")]),
        };
        let transfers = FakeTransfers::default();
        let notifier = RecordingNotifier { sent: Mutex::new(vec![]) };

        let err = init_upload(
            &users,
            &FakeCredits,
            &transfers,
            &notifier,
            &HashedId::from_stored("alice"),
            "CODE123",
            1024,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RelayError::SelfTransfer));
    }

    #[tokio::test]
    async fn unknown_code_is_no_such_recipient() {
        let users = FakeUsers { rows: Mutex::new(vec![]) };
        let transfers = FakeTransfers::default();
        let notifier = RecordingNotifier { sent: Mutex::new(vec![]) };

        let err = init_upload(
            &users,
            &FakeCredits,
            &transfers,
            &notifier,
            &HashedId::from_stored("alice"),
            "NOPE",
            1024,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RelayError::NoSuchRecipient));
    }

    #[tokio::test]
    async fn second_init_upload_cancels_first_and_notifies_sender() {
        let users = FakeUsers {
            rows: Mutex::new(vec![sample_user("bob", "BOBCODE")]),
        };
        let transfers = FakeTransfers::default();
        let notifier = RecordingNotifier { sent: Mutex::new(vec![]) };
        let alice = HashedId::from_stored("alice");

        init_upload(&users, &FakeCredits, &transfers, &notifier, &alice, "BOBCODE", 100)
            .await
            .unwrap();
        init_upload(&users, &FakeCredits, &transfers, &notifier, &alice, "BOBCODE", 100)
            .await
            .unwrap();

        let live_count = transfers
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.is_live())
            .count();
        assert_eq!(live_count, 1, "exactly one live transfer must remain");

        let sent = notifier.sent.lock().unwrap();
        assert!(sent
            .iter()
            .any(|(_, m)| matches!(m, PushMessage::Notice { title, .. } if title == "Cancelled Transfer")));
    }

    #[tokio::test]
    async fn upload_body_rejects_oversized_actual_size() {
        let transfers = FakeTransfers::default();
        let notifier = RecordingNotifier { sent: Mutex::new(vec![]) };
        let ticket = UploadTicket {
            transfer_id: Uuid::new_v4(),
            sender: HashedId::from_stored("alice"),
            recipient: HashedId::from_stored("bob"),
            declared_size: 1000,
            expiry: Utc::now() + Duration::minutes(5),
            nonce: [0; 16],
        };
        let err = upload_body(&transfers, &notifier, &ticket, "dir/file".into(), 2000, vec![], 10)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::SizeLied));
    }

    #[tokio::test]
    async fn completed_download_is_idempotent_on_second_call() {
        let transfers = FakeTransfers::default();
        let notifier = RecordingNotifier { sent: Mutex::new(vec![]) };
        let users = FakeUsers {
            rows: Mutex::new(vec![sample_user("alice", "ALICECODE")]),
        };
        let id = Uuid::new_v4();
        transfers.rows.lock().unwrap().push(Transfer {
            id,
            sender: HashedId::from_stored("alice"),
            recipient: HashedId::from_stored("bob"),
            object_name: Some("dir/file".into()),
            declared_size: 10,
            actual_size: Some(10),
            password: Some(vec![1, 2, 3]),
            expiry: Some(Utc::now() + Duration::minutes(5)),
            updated_at: Some(Utc::now()),
            finished_at: None,
            failed: false,
        });

        let recipient = HashedId::from_stored("bob");
        let password = completed_download(&users, &FakeCredits, &transfers, &notifier, &recipient, "dir/file")
            .await
            .unwrap();
        assert_eq!(password, vec![1, 2, 3]);

        let err = completed_download(&users, &FakeCredits, &transfers, &notifier, &recipient, "dir/file")
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::AlreadyFinalized));
    }
}
