//! `CreditRepository` against Postgres.

use crate::error::map_sqlx;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_core::error::Result;
use relay_core::repo::CreditRepository;
use relay_core::types::CreditGrant;
use relay_crypto::HashedId;
use sqlx::PgPool;

pub struct PgCreditRepository {
    pool: PgPool,
}

impl PgCreditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

struct CreditRow {
    activation_code: String,
    amount: i64,
    owner: Option<String>,
    activated_at: Option<DateTime<Utc>>,
    permanent_code: Option<String>,
    custom_code: Option<String>,
}

impl From<CreditRow> for CreditGrant {
    fn from(row: CreditRow) -> Self {
        CreditGrant {
            activation_code: row.activation_code,
            amount: row.amount,
            owner: row.owner.map(HashedId::from_stored),
            activated_at: row.activated_at,
            permanent_code: row.permanent_code,
            custom_code: row.custom_code,
        }
    }
}

#[async_trait]
impl CreditRepository for PgCreditRepository {
    async fn get(&self, activation_code: &str) -> Result<Option<CreditGrant>> {
        let row = sqlx::query_as!(
            CreditRow,
            r#"SELECT activation_code, amount, owner, activated_at, permanent_code, custom_code
               FROM credits WHERE activation_code = $1"#,
            activation_code,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(row.map(CreditGrant::from))
    }

    /// Single-row CAS: only succeeds while `owner IS NULL`.
    async fn bind(&self, activation_code: &str, owner: &HashedId) -> Result<bool> {
        let result = sqlx::query!(
            r#"UPDATE credits SET owner = $2, activated_at = now()
               WHERE activation_code = $1 AND owner IS NULL"#,
            activation_code,
            owner.as_str(),
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(result.rows_affected() == 1)
    }

    async fn sum_credit(&self, owner: &HashedId) -> Result<i64> {
        let sum: Option<i64> = sqlx::query_scalar!(
            "SELECT SUM(amount) FROM credits WHERE owner = $1",
            owner.as_str(),
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(sum.unwrap_or(0))
    }

    async fn set_permanent_code(&self, owner: &HashedId, code: Option<String>) -> Result<()> {
        sqlx::query!(
            "UPDATE credits SET permanent_code = $2 WHERE owner = $1",
            owner.as_str(),
            code,
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn set_custom_code(&self, owner: &HashedId, code: Option<String>) -> Result<()> {
        sqlx::query!(
            "UPDATE credits SET custom_code = $2 WHERE owner = $1",
            owner.as_str(),
            code,
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn is_code_taken(&self, code: &str) -> Result<bool> {
        let taken: bool = sqlx::query_scalar!(
            r#"SELECT EXISTS(
                   SELECT 1 FROM users WHERE code = $1
                   UNION ALL
                   SELECT 1 FROM credits WHERE permanent_code = $1 OR custom_code = $1
               ) AS "exists!""#,
            code,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(taken)
    }

    async fn current_codes(&self, owner: &HashedId) -> Result<(Option<String>, Option<String>)> {
        let row = sqlx::query!(
            r#"SELECT permanent_code, custom_code FROM credits
               WHERE owner = $1 AND (permanent_code IS NOT NULL OR custom_code IS NOT NULL)
               LIMIT 1"#,
            owner.as_str(),
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(row.map(|r| (r.permanent_code, r.custom_code)).unwrap_or((None, None)))
    }
}
