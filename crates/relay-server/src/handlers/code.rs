//! `/code`, `/register`, `/toggle-perm-code`, `/custom-code` — the identity
//! and rendezvous-code ledger (C1/C2) at the HTTP boundary.

use crate::auth::{caller_from_headers, digest_identity, digest_identity_key};
use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use relay_core::error::RelayError;
use relay_core::types::AccountStats;
use relay_core::{code, identity};
use relay_crypto::pubkey;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const IDENTITY_HEADER: &str = "X-Identity";
const IDENTITY_KEY_HEADER: &str = "X-Identity-Key";

#[derive(Serialize)]
pub struct UserView {
    /// Present only the one time a fresh identity-key is minted; the
    /// client must persist it, it is never shown again.
    pub new_identity_key: Option<String>,
    pub code: Option<String>,
    pub code_expiry: Option<DateTime<Utc>>,
    pub stats: AccountStats,
}

async fn user_view(state: &AppState, identity: &relay_crypto::HashedId, new_identity_key: Option<String>) -> ApiResult<UserView> {
    let user = state
        .users
        .get(identity)
        .await?
        .ok_or_else(|| RelayError::Internal("user missing after a write that should have created it".into()))?;
    let stats = identity::recompute_stats(&*state.users, &*state.credits, &*state.transfers, identity).await?;
    Ok(UserView {
        new_identity_key,
        code: user.code,
        code_expiry: user.code_expiry,
        stats,
    })
}

#[derive(Deserialize)]
pub struct CodeRequest {
    /// Base64 DER SubjectPublicKeyInfo.
    pub public_key: String,
    pub wanted_minutes: i64,
    pub expected_permanent_code: Option<String>,
}

/// Register or refresh the caller's ephemeral code. If the caller doesn't
/// present an `X-Identity-Key`, this is a first-time registration: the
/// server mints a fresh raw secret, stores its digest, and hands the raw
/// secret back once in the response for the client to keep.
pub async fn code_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CodeRequest>,
) -> ApiResult<Json<UserView>> {
    let raw_identity = headers
        .get(IDENTITY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(RelayError::BadIdentity)?;
    let identity = digest_identity(raw_identity)?;

    let (presented_key, minted_raw_key) = match headers.get(IDENTITY_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        Some(raw) => (digest_identity_key(raw), None),
        None => {
            let raw = Uuid::new_v4().to_string();
            (digest_identity_key(&raw), Some(raw))
        }
    };

    if !pubkey::is_valid_rsa_spki(&body.public_key) {
        return Err(RelayError::BadPublicKey.into());
    }
    let public_key_bytes = STANDARD
        .decode(&body.public_key)
        .map_err(|_| RelayError::BadPublicKey)?;

    let outcome = identity::register(
        &*state.users,
        &identity,
        Some(&presented_key),
        public_key_bytes,
        body.wanted_minutes,
    )
    .await?;

    identity::ensure_ephemeral_code(
        &*state.users,
        &*state.credits,
        &identity,
        body.wanted_minutes,
        body.expected_permanent_code.as_deref(),
    )
    .await?;

    let new_identity_key = match outcome {
        identity::RegisterOutcome::Created { .. } => minted_raw_key,
        identity::RegisterOutcome::Refreshed => None,
    };

    Ok(Json(user_view(&state, &identity, new_identity_key).await?))
}

#[derive(Deserialize)]
pub struct BindCreditRequest {
    pub activation_code: String,
}

/// *Bind credit* — this route is named `/register`, distinct from the
/// device-registration `/code` route above.
pub async fn bind_credit_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<BindCreditRequest>,
) -> ApiResult<()> {
    let (identity, identity_key) = caller_from_headers(&headers)?;
    if !identity::validate(&*state.users, &identity, &identity_key).await? {
        return Err(RelayError::IdentityKeyMismatch.into());
    }
    identity::bind_credit(&*state.credits, &identity, &body.activation_code).await?;
    Ok(())
}

pub async fn toggle_perm_code_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<UserView>> {
    let (identity, identity_key) = caller_from_headers(&headers)?;
    if !identity::validate(&*state.users, &identity, &identity_key).await? {
        return Err(RelayError::IdentityKeyMismatch.into());
    }

    let owner_credit = state.credits.sum_credit(&identity).await?;
    let (current_permanent, current_custom) = state.credits.current_codes(&identity).await?;

    code::toggle_permanent_code(
        &*state.credits,
        &identity,
        owner_credit,
        current_permanent.as_deref(),
        current_custom.as_deref(),
    )
    .await?;

    Ok(Json(user_view(&state, &identity, None).await?))
}

#[derive(Deserialize)]
pub struct CustomCodeRequest {
    pub code: String,
}

pub async fn custom_code_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CustomCodeRequest>,
) -> ApiResult<Json<UserView>> {
    let (identity, identity_key) = caller_from_headers(&headers)?;
    if !identity::validate(&*state.users, &identity, &identity_key).await? {
        return Err(RelayError::IdentityKeyMismatch.into());
    }

    let owner_credit = state.credits.sum_credit(&identity).await?;
    code::set_custom_code(&*state.credits, &identity, owner_credit, &body.code).await?;

    Ok(Json(user_view(&state, &identity, None).await?))
}
