//! Conversions from storage-layer errors into [`relay_core::RelayError`].
//! Every `sqlx::Error` becomes `RelayError::Storage`, a downstream
//! transient error per the error-handling taxonomy — domain code upstream
//! never inspects the underlying driver error.

use relay_core::RelayError;

pub fn map_sqlx(err: sqlx::Error) -> RelayError {
    RelayError::Storage(err.to_string())
}
