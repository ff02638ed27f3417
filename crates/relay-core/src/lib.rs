//! # Relay Core
//!
//! Domain rules for the relay broker, independent of any storage or
//! transport technology: the identity & tier ledger, code allocator,
//! transfer state machine, and the maintenance/reaper logic that keeps
//! them converging. Every public function here is storage-agnostic; it
//! calls through the [`repo`] traits, which `relay-storage` implements
//! against Postgres.

pub mod code;
pub mod error;
pub mod identity;
pub mod maintenance;
pub mod notify;
pub mod repo;
pub mod tier;
pub mod transfer;
pub mod types;

pub use error::{RelayError, Result};
pub use types::{AccountStats, CreditGrant, PushMessage, Tier, Transfer, TransferState, UploadTicket, User};

/// Convenience re-exports for crates consuming the domain layer.
pub mod prelude {
    pub use crate::error::{RelayError, Result};
    pub use crate::notify::Notifier;
    pub use crate::repo::{CreditRepository, TransferRepository, UserRepository};
    pub use crate::types::*;
}
