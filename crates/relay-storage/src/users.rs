//! `UserRepository` against Postgres.

use crate::error::map_sqlx;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_core::error::Result;
use relay_core::repo::UserRepository;
use relay_core::types::User;
use relay_crypto::HashedId;
use sqlx::PgPool;

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

struct UserRow {
    identity: String,
    identity_key: String,
    public_key: Vec<u8>,
    code: Option<String>,
    code_expiry: Option<DateTime<Utc>>,
    wanted_minutes: i64,
    registered_at: DateTime<Utc>,
    connected: bool,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            identity: HashedId::from_stored(row.identity),
            identity_key: HashedId::from_stored(row.identity_key),
            public_key: row.public_key,
            code: row.code,
            code_expiry: row.code_expiry,
            wanted_minutes: row.wanted_minutes,
            registered_at: row.registered_at,
            connected: row.connected,
        }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn get(&self, identity: &HashedId) -> Result<Option<User>> {
        let row = sqlx::query_as!(
            UserRow,
            r#"SELECT identity, identity_key, public_key, code, code_expiry,
                      wanted_minutes, registered_at, connected
               FROM users WHERE identity = $1"#,
            identity.as_str(),
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(row.map(User::from))
    }

    async fn insert(&self, user: &User) -> Result<()> {
        sqlx::query!(
            r#"INSERT INTO users (identity, identity_key, public_key, code, code_expiry, wanted_minutes, registered_at, connected)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
            user.identity.as_str(),
            user.identity_key.as_str(),
            user.public_key,
            user.code,
            user.code_expiry,
            user.wanted_minutes,
            user.registered_at,
            user.connected,
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn refresh_session(&self, identity: &HashedId, wanted_minutes: i64) -> Result<()> {
        sqlx::query!(
            "UPDATE users SET wanted_minutes = $2 WHERE identity = $1",
            identity.as_str(),
            wanted_minutes,
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn rotate_identity_key(&self, identity: &HashedId, new_key: &HashedId) -> Result<()> {
        sqlx::query!(
            "UPDATE users SET identity_key = $2 WHERE identity = $1 AND identity_key = ''",
            identity.as_str(),
            new_key.as_str(),
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn set_code(
        &self,
        identity: &HashedId,
        code: Option<String>,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query!(
            "UPDATE users SET code = $2, code_expiry = $3 WHERE identity = $1",
            identity.as_str(),
            code,
            expiry,
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn set_connected(&self, identity: &HashedId, connected: bool) -> Result<()> {
        sqlx::query!(
            "UPDATE users SET connected = $2 WHERE identity = $1",
            identity.as_str(),
            connected,
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<User>> {
        let row = sqlx::query_as!(
            UserRow,
            r#"SELECT identity, identity_key, public_key, code, code_expiry,
                      wanted_minutes, registered_at, connected
               FROM users
               WHERE code = $1 AND (code_expiry IS NULL OR code_expiry > now())"#,
            code,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(row.map(User::from))
    }
}
