//! Postgres-backed repositories and S3-compatible object store for the
//! relay broker. `relay-core` never depends on this crate; it only ever
//! sees the trait objects this crate implements.

pub mod blob;
pub mod credits;
pub mod error;
pub mod transfers;
pub mod users;

pub use blob::BlobStore;
pub use credits::PgCreditRepository;
pub use transfers::PgTransferRepository;
pub use users::PgUserRepository;

use relay_core::error::{RelayError, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Open a connection pool and run the migrations embedded in this crate.
pub async fn connect(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(|e| RelayError::Storage(e.to_string()))?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| RelayError::Storage(e.to_string()))?;

    Ok(pool)
}
