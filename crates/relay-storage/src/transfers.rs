//! `TransferRepository` against Postgres.

use crate::error::map_sqlx;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_core::error::Result;
use relay_core::repo::TransferRepository;
use relay_core::types::Transfer;
use relay_crypto::HashedId;
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgTransferRepository {
    pool: PgPool,
}

impl PgTransferRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

struct TransferRow {
    id: Uuid,
    sender: String,
    recipient: String,
    object_name: Option<String>,
    declared_size: i64,
    actual_size: Option<i64>,
    password: Option<Vec<u8>>,
    expiry: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    failed: bool,
}

impl From<TransferRow> for Transfer {
    fn from(row: TransferRow) -> Self {
        Transfer {
            id: row.id,
            sender: HashedId::from_stored(row.sender),
            recipient: HashedId::from_stored(row.recipient),
            object_name: row.object_name,
            declared_size: row.declared_size,
            actual_size: row.actual_size,
            password: row.password,
            expiry: row.expiry,
            updated_at: row.updated_at,
            finished_at: row.finished_at,
            failed: row.failed,
        }
    }
}

#[async_trait]
impl TransferRepository for PgTransferRepository {
    async fn find_live(&self, sender: &HashedId, recipient: &HashedId) -> Result<Option<Transfer>> {
        let row = sqlx::query_as!(
            TransferRow,
            r#"SELECT id, sender, recipient, object_name, declared_size, actual_size,
                      password, expiry, updated_at, finished_at, failed
               FROM transfers
               WHERE sender = $1 AND recipient = $2 AND finished_at IS NULL"#,
            sender.as_str(),
            recipient.as_str(),
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(row.map(Transfer::from))
    }

    async fn insert_reserved(&self, transfer: &Transfer) -> Result<()> {
        sqlx::query!(
            r#"INSERT INTO transfers
                   (id, sender, recipient, object_name, declared_size, actual_size,
                    password, expiry, updated_at, finished_at, failed)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"#,
            transfer.id,
            transfer.sender.as_str(),
            transfer.recipient.as_str(),
            transfer.object_name,
            transfer.declared_size,
            transfer.actual_size,
            transfer.password,
            transfer.expiry,
            transfer.updated_at,
            transfer.finished_at,
            transfer.failed,
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn fail(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query!(
            "UPDATE transfers SET finished_at = now(), failed = true WHERE id = $1 AND finished_at IS NULL",
            id,
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(result.rows_affected() == 1)
    }

    async fn commit(
        &self,
        id: Uuid,
        object_name: String,
        actual_size: i64,
        password: Vec<u8>,
        expiry: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query!(
            r#"UPDATE transfers
               SET object_name = $2, actual_size = $3, password = $4, expiry = $5, updated_at = now()
               WHERE id = $1 AND finished_at IS NULL AND object_name IS NULL"#,
            id,
            object_name,
            actual_size,
            password,
            expiry,
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_for_download(
        &self,
        recipient: &HashedId,
        object_name: &str,
    ) -> Result<Option<Transfer>> {
        let row = sqlx::query_as!(
            TransferRow,
            r#"SELECT id, sender, recipient, object_name, declared_size, actual_size,
                      password, expiry, updated_at, finished_at, failed
               FROM transfers
               WHERE recipient = $1 AND object_name = $2 AND finished_at IS NULL"#,
            recipient.as_str(),
            object_name,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(row.map(Transfer::from))
    }

    async fn finish(&self, id: Uuid, failed: bool) -> Result<Option<Transfer>> {
        let row = sqlx::query_as!(
            TransferRow,
            r#"UPDATE transfers
               SET object_name = NULL, password = NULL, finished_at = now(), failed = $2
               WHERE id = $1 AND finished_at IS NULL
               RETURNING id, sender, recipient, object_name, declared_size, actual_size,
                         password, expiry, updated_at, finished_at, failed"#,
            id,
            failed,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(row.map(Transfer::from))
    }

    async fn touch(&self, recipient: &HashedId, object_name: &str) -> Result<bool> {
        let result = sqlx::query!(
            r#"UPDATE transfers SET updated_at = now()
               WHERE recipient = $1 AND object_name = $2 AND finished_at IS NULL"#,
            recipient.as_str(),
            object_name,
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(result.rows_affected() == 1)
    }

    async fn bandwidth_sent_today(&self, sender: &HashedId) -> Result<i64> {
        let sum: Option<i64> = sqlx::query_scalar!(
            r#"SELECT SUM(actual_size) FROM transfers
               WHERE sender = $1 AND failed = false AND finished_at >= date_trunc('day', now())"#,
            sender.as_str(),
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(sum.unwrap_or(0))
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<Vec<Transfer>> {
        let rows = sqlx::query_as!(
            TransferRow,
            r#"SELECT id, sender, recipient, object_name, declared_size, actual_size,
                      password, expiry, updated_at, finished_at, failed
               FROM transfers
               WHERE finished_at IS NULL
                 AND (
                       (updated_at IS NULL AND expiry < $1)
                    OR (updated_at + INTERVAL '1 minute' <= $1)
                 )"#,
            now,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(rows.into_iter().map(Transfer::from).collect())
    }
}
