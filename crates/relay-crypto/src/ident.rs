//! Identifier hashing — the `RawId` / `HashedId` duality from the design notes.
//!
//! Every identifier that touches the wire arrives as a `RawId`. Nothing but
//! this module is allowed to turn one into the `HashedId` that actually gets
//! stored or compared; that way a database leak never hands back something
//! that can be presented as a credential.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A secret or identifier exactly as presented by a client: never persisted.
#[derive(Clone)]
pub struct RawId(String);

impl RawId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Digest this value the one way a `RawId` is ever allowed to cross
    /// into stored form.
    pub fn digest(&self) -> HashedId {
        let hash = Sha256::digest(self.0.as_bytes());
        HashedId(BASE64.encode(hash))
    }
}

impl fmt::Debug for RawId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawId(<redacted>)")
    }
}

/// The one-way digest of a `RawId`: base64(SHA-256(raw)). This is the only
/// form ever written to the database or compared against stored rows.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HashedId(String);

impl HashedId {
    /// Wrap an already-hashed value, e.g. one read back from a row.
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A short, log-safe prefix — never the full digest, so log lines don't
    /// become a lookup table for the stored identifier.
    pub fn log_prefix(&self) -> &str {
        let end = self.0.len().min(8);
        &self.0[..end]
    }
}

impl fmt::Debug for HashedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashedId({}…)", self.log_prefix())
    }
}

impl fmt::Display for HashedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Constant-time equality between two hashed identifiers, for credential
/// comparisons (`Validate` in the identity ledger).
pub fn digests_match(a: &HashedId, b: &HashedId) -> bool {
    let a = a.0.as_bytes();
    let b = b.0.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic_base64_sha256() {
        let raw = RawId::new("device-secret-123");
        let hashed = raw.digest();

        let expected = {
            let hash = Sha256::digest(b"device-secret-123");
            BASE64.encode(hash)
        };
        assert_eq!(hashed.as_str(), expected);
    }

    #[test]
    fn different_inputs_hash_differently() {
        assert_ne!(
            RawId::new("a").digest().as_str(),
            RawId::new("b").digest().as_str()
        );
    }

    #[test]
    fn digests_match_is_constant_time_shaped_and_correct() {
        let a = RawId::new("same").digest();
        let b = RawId::new("same").digest();
        let c = RawId::new("different").digest();

        assert!(digests_match(&a, &b));
        assert!(!digests_match(&a, &c));
    }

    #[test]
    fn log_prefix_never_exposes_full_digest() {
        let hashed = RawId::new("device-secret-123").digest();
        assert!(hashed.log_prefix().len() <= 8);
        assert_ne!(hashed.log_prefix(), hashed.as_str());
    }
}
