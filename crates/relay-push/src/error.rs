//! Error type for the push funnel, convertible into [`relay_core::RelayError`]
//! at the point it crosses back into domain logic.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PushError>;

#[derive(Error, Debug)]
pub enum PushError {
    #[error("bus error: {0}")]
    Bus(String),

    #[error("local sink closed")]
    SinkClosed,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<PushError> for relay_core::RelayError {
    fn from(err: PushError) -> Self {
        relay_core::RelayError::PushBus(err.to_string())
    }
}
