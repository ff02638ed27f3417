//! Small string-shaped validators that don't deserve their own module:
//! client version strings and identity strings.

use crate::error::{CryptoError, Result};
use uuid::Uuid;

/// A client-reported version string is accepted if it is only digits and
/// dots (`^[\d.]*$` in the original). Empty is allowed: older clients don't
/// send one.
pub fn is_valid_version(version: &str) -> bool {
    version.chars().all(|c| c.is_ascii_digit() || c == '.')
}

/// Validate a version string, returning the typed error on rejection.
pub fn validate_version(version: &str) -> Result<()> {
    if is_valid_version(version) {
        Ok(())
    } else {
        Err(CryptoError::InvalidVersion(version.to_string()))
    }
}

/// Identity strings must parse as a UUID in any of uuid's accepted textual
/// forms (hyphenated, simple, urn). The broker doesn't care which form a
/// client uses as long as it round-trips.
pub fn is_valid_identity(identity: &str) -> bool {
    Uuid::parse_str(identity).is_ok()
}

/// Validate an identity string, returning the typed error on rejection.
pub fn validate_identity(identity: &str) -> Result<Uuid> {
    Uuid::parse_str(identity).map_err(|_| CryptoError::InvalidIdentity(identity.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_accepts_digits_and_dots() {
        assert!(is_valid_version("1.2.3"));
        assert!(is_valid_version(""));
        assert!(is_valid_version("10"));
    }

    #[test]
    fn version_rejects_anything_else() {
        assert!(!is_valid_version("1.2.3-beta"));
        assert!(!is_valid_version("v1"));
    }

    #[test]
    fn identity_accepts_hyphenated_and_simple_uuid() {
        let u = Uuid::new_v4();
        assert!(is_valid_identity(&u.hyphenated().to_string()));
        assert!(is_valid_identity(&u.simple().to_string()));
    }

    #[test]
    fn identity_rejects_non_uuid_strings() {
        assert!(!is_valid_identity("not-a-uuid"));
        assert!(!is_valid_identity(""));
    }

    #[test]
    fn validate_identity_returns_typed_error() {
        let err = validate_identity("nope").unwrap_err();
        assert!(matches!(err, CryptoError::InvalidIdentity(_)));
    }
}
