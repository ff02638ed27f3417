//! Error types for relay broker core operations

use thiserror::Error;

/// Result type alias for relay core operations
pub type Result<T> = std::result::Result<T, RelayError>;

/// Errors raised by the domain logic. `relay-server` maps each variant to
/// an HTTP status via [`RelayError::status_code`]; domain code never
/// constructs an HTTP response itself.
#[derive(Error, Debug, Clone)]
pub enum RelayError {
    // === BadRequest ===
    /// Malformed version string
    #[error("invalid version string")]
    BadVersion,

    /// Identity string did not parse as a UUID
    #[error("invalid identity format")]
    BadIdentity,

    /// Public key did not decode to a valid RSA SubjectPublicKeyInfo
    #[error("invalid public key")]
    BadPublicKey,

    /// Declared upload size is not a positive number of bytes
    #[error("invalid declared size")]
    BadSize,

    /// Required field missing or unparsable on a form/JSON body
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    // === AuthFailed ===
    /// Stored and presented identity-key digests did not match
    #[error("identity key mismatch")]
    IdentityKeyMismatch,

    /// Caller is not authorized for the object/transfer they named
    /// (`/download`: no non-finished transfer matches recipient+object)
    #[error("not authorized")]
    NotAuthorized,

    /// `/completed-download` found no password to return: the transfer is
    /// already finished, or never matched the caller at all
    #[error("no password available, transfer already finalized")]
    AlreadyFinalized,

    /// No upload ticket present, or ticket already consumed
    #[error("no upload ticket")]
    NoTicket,

    // === PreconditionFailed ===
    /// Rendezvous code does not resolve to a live recipient
    #[error("no such recipient")]
    NoSuchRecipient,

    /// Sender and recipient are the same identity
    #[error("self transfer not allowed")]
    SelfTransfer,

    /// Phase-2 body exceeded the declared size from phase 1
    #[error("actual size exceeds declared size")]
    SizeLied,

    // === QuotaExceeded ===
    /// Declared size would exceed the sender's remaining daily bandwidth
    #[error("over bandwidth quota")]
    OverBandwidth,

    /// Declared size exceeds the sender's tier-limited max file size
    #[error("over file size limit")]
    OverFileSize,

    // === Tier / credit errors ===
    /// Activation code does not exist
    #[error("no such credit grant")]
    NoSuchCredit,

    /// Activation code already bound to a user
    #[error("credit already bound")]
    CreditAlreadyBound,

    /// Caller's tier is insufficient for the requested operation
    #[error("insufficient tier")]
    InsufficientTier,

    /// Custom code failed shape validation or collided with an existing one
    #[error("invalid or taken custom code")]
    BadCustomCode,

    // === DownstreamTransient ===
    /// The authoritative store returned an error
    #[error("storage error: {0}")]
    Storage(String),

    /// The object/blob store returned an error
    #[error("object store error: {0}")]
    ObjectStore(String),

    /// The push bus returned an error
    #[error("push bus error: {0}")]
    PushBus(String),

    /// Catch-all for invariants that should be unreachable
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Map a domain error to its HTTP status, including the 461-465
    /// application-specific codes that MUST be preserved for client
    /// compatibility.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadVersion
            | Self::BadIdentity
            | Self::BadPublicKey
            | Self::MalformedRequest(_)
            | Self::NoTicket
            | Self::SizeLied => 400,

            Self::IdentityKeyMismatch | Self::AlreadyFinalized => 402,

            Self::NotAuthorized => 400,
            Self::InsufficientTier
            | Self::BadCustomCode
            | Self::NoSuchCredit
            | Self::CreditAlreadyBound => 401,

            Self::BadSize => 461,
            Self::NoSuchRecipient => 462,
            Self::SelfTransfer => 463,
            Self::OverBandwidth => 464,
            Self::OverFileSize => 465,

            Self::Storage(_) | Self::ObjectStore(_) | Self::PushBus(_) | Self::Internal(_) => 500,
        }
    }

    /// `true` for the [`RelayError::Storage`]/[`RelayError::ObjectStore`]/
    /// [`RelayError::PushBus`] family: a downstream failure where the
    /// single mutation that failed is treated as not-done and recovered by
    /// idempotence (unconsumed ticket, the next reaper tick) rather than by
    /// a core-level retry.
    pub fn is_downstream_transient(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::ObjectStore(_) | Self::PushBus(_)
        )
    }
}
