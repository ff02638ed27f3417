//! Cryptographic and validation error types

use thiserror::Error;

/// Result type for crypto/validation operations
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors raised while validating identifiers, keys or rendezvous codes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Input was not valid base64
    #[error("invalid base64: {0}")]
    InvalidBase64(String),

    /// Public key did not decode to a SubjectPublicKeyInfo structure
    #[error("invalid public key structure: {0}")]
    InvalidPublicKey(String),

    /// Public key's algorithm identifier was not RSA
    #[error("public key is not an RSA key")]
    NotRsaKey,

    /// Identity string was not a UUID in any textual form
    #[error("invalid identity format: {0}")]
    InvalidIdentity(String),

    /// Version string did not match `^[\d.]*$`
    #[error("invalid version string: {0}")]
    InvalidVersion(String),

    /// Custom code did not match the required alphabet/length
    #[error("invalid custom code: {0}")]
    InvalidCode(String),
}
