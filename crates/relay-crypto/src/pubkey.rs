//! Public key structure validation.
//!
//! The broker never does anything cryptographic with a client's public key
//! beyond checking that it *is* one: a base64 blob that decodes to a DER
//! SubjectPublicKeyInfo wrapping an RSA key. Actual encryption happens
//! end-to-end between clients: we only gate against garbage being stored.

use crate::error::{CryptoError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use pkcs8::{der::Decode, SubjectPublicKeyInfoRef};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::RsaPublicKey;

/// The RSA OID inside a SubjectPublicKeyInfo's AlgorithmIdentifier
/// (`rsaEncryption`, 1.2.840.113549.1.1.1).
const RSA_ENCRYPTION_OID: &str = "1.2.840.113549.1.1.1";

/// Parse and validate a base64-encoded DER SubjectPublicKeyInfo as an RSA
/// public key. Returns the parsed key so callers can inspect modulus size
/// if a future tier wants to cap it, but today callers only care that this
/// returns `Ok`.
pub fn validate_rsa_spki(base64_der: &str) -> Result<RsaPublicKey> {
    let der = BASE64
        .decode(base64_der.trim())
        .map_err(|e| CryptoError::InvalidBase64(e.to_string()))?;

    let spki = SubjectPublicKeyInfoRef::from_der(&der)
        .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;

    if spki.algorithm.oid.to_string() != RSA_ENCRYPTION_OID {
        return Err(CryptoError::NotRsaKey);
    }

    RsaPublicKey::from_pkcs1_der(
        spki.subject_public_key
            .as_bytes()
            .ok_or_else(|| CryptoError::InvalidPublicKey("unused bits in key".into()))?,
    )
    .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
}

/// `true` iff the given string is a syntactically valid base64 RSA SPKI.
/// Convenience wrapper for request validators that only need a bool.
pub fn is_valid_rsa_spki(base64_der: &str) -> bool {
    validate_rsa_spki(base64_der).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs8::EncodePublicKey;
    use rsa::traits::PublicKeyParts;

    fn sample_spki_base64() -> String {
        // A small key is enough: we only exercise structure validation here,
        // not anything security-sensitive about key size.
        let mut rng = rand::thread_rng();
        let priv_key = rsa::RsaPrivateKey::new(&mut rng, 512).expect("generate key");
        let pub_key = RsaPublicKey::from(&priv_key);
        let der = pub_key.to_public_key_der().expect("encode spki");
        BASE64.encode(der.as_bytes())
    }

    #[test]
    fn accepts_a_real_rsa_spki() {
        let encoded = sample_spki_base64();
        let parsed = validate_rsa_spki(&encoded).expect("should parse");
        assert!(parsed.n().bits() > 0);
    }

    #[test]
    fn rejects_non_base64() {
        let err = validate_rsa_spki("not base64 at all!!").unwrap_err();
        assert!(matches!(err, CryptoError::InvalidBase64(_)));
    }

    #[test]
    fn rejects_base64_garbage_der() {
        let encoded = BASE64.encode(b"not a der structure");
        let err = validate_rsa_spki(&encoded).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidPublicKey(_)));
    }

    #[test]
    fn is_valid_rsa_spki_matches_validate_rsa_spki() {
        let encoded = sample_spki_base64();
        assert!(is_valid_rsa_spki(&encoded));
        assert!(!is_valid_rsa_spki("garbage"));
    }
}
