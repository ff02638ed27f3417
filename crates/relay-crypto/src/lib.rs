//! # Relay Crypto
//!
//! Identifier hashing, public-key structure validation and rendezvous-code
//! helpers for the relay broker.
//!
//! The broker is deliberately not a cryptography-heavy service: clients
//! encrypt payloads end-to-end before the blob ever reaches the relay. What
//! lives here is the smaller, duller set of things the server itself must
//! get right:
//!
//! - [`ident`] — the `RawId`/`HashedId` duality. Secrets and device
//!   identifiers are hashed with `base64(SHA-256(raw))` before they're ever
//!   persisted or logged.
//! - [`pubkey`] — validating that a client-submitted public key is a
//!   structurally sound RSA SubjectPublicKeyInfo, without doing anything
//!   cryptographic with it.
//! - [`code`] — the alphabet and generator for rendezvous codes.
//! - [`validate`] — small string-shaped validators (version strings,
//!   identity UUIDs) shared across the server.

pub mod code;
pub mod error;
pub mod ident;
pub mod pubkey;
pub mod validate;

pub use error::{CryptoError, Result};
pub use ident::{digests_match, HashedId, RawId};

/// Convenience re-exports for crates that only need the common path.
pub mod prelude {
    pub use crate::code::{generate, generate_default, is_valid_custom_code};
    pub use crate::error::{CryptoError, Result};
    pub use crate::ident::{digests_match, HashedId, RawId};
    pub use crate::pubkey::{is_valid_rsa_spki, validate_rsa_spki};
    pub use crate::validate::{validate_identity, validate_version};
}
