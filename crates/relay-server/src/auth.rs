//! HTTP-boundary authentication: the shared-secret gate in front of every
//! route but `/health`/`/live`, and the raw-to-hashed identity conversion
//! every handler needs before it can call into `relay-core`.

use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use relay_core::error::RelayError;
use relay_crypto::{validate, HashedId, RawId};

const SHARED_SECRET_HEADER: &str = "Sec-Key";
const IDENTITY_HEADER: &str = "X-Identity";
const IDENTITY_KEY_HEADER: &str = "X-Identity-Key";

/// Gate every wrapped route behind the shared secret. Callers never see
/// `relay-core` errors here; a missing or wrong header is rejected before
/// the request reaches domain logic.
pub async fn require_shared_secret(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let presented = request
        .headers()
        .get(SHARED_SECRET_HEADER)
        .and_then(|value| value.to_str().ok());

    match presented {
        Some(value) if value == state.config.auth.shared_secret => Ok(next.run(request).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

/// Validate a raw identity string's shape and digest it to its stored form.
pub fn digest_identity(raw: &str) -> Result<HashedId, RelayError> {
    validate::validate_identity(raw).map_err(|_| RelayError::BadIdentity)?;
    Ok(RawId::new(raw).digest())
}

/// Digest a raw identity-key secret. Identity-keys are opaque bearer
/// strings, not UUIDs, so there's no shape to validate.
pub fn digest_identity_key(raw: &str) -> HashedId {
    RawId::new(raw).digest()
}

/// Pull the caller's identity and identity-key off `X-Identity`/
/// `X-Identity-Key` and digest both. Every route but `/code` and `/ws`
/// calls this and then [`relay_core::identity::validate`] against it.
pub fn caller_from_headers(headers: &HeaderMap) -> Result<(HashedId, HashedId), RelayError> {
    let raw_identity = headers
        .get(IDENTITY_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(RelayError::BadIdentity)?;
    let raw_identity_key = headers
        .get(IDENTITY_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(RelayError::IdentityKeyMismatch)?;

    Ok((digest_identity(raw_identity)?, digest_identity_key(raw_identity_key)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_identity_rejects_non_uuid_strings() {
        let err = digest_identity("not-a-uuid").unwrap_err();
        assert!(matches!(err, RelayError::BadIdentity));
    }

    #[test]
    fn digest_identity_accepts_a_uuid() {
        let identity = digest_identity("3fe47c03-7a58-4b2e-9d0a-3c8f0a6e9b11").unwrap();
        assert!(!identity.as_str().is_empty());
    }

    #[test]
    fn caller_from_headers_requires_both_headers() {
        let headers = HeaderMap::new();
        let err = caller_from_headers(&headers).unwrap_err();
        assert!(matches!(err, RelayError::BadIdentity));
    }
}
