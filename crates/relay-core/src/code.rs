//! Code allocator (C2): ephemeral/permanent/custom rendezvous codes and
//! the toggle semantics between them.

use crate::error::{RelayError, Result};
use crate::repo::CreditRepository;
use crate::tier::{tier_for_credit, CUSTOM_CODE_MIN_TIER, PERMANENT_CODE_MIN_TIER};
use relay_crypto::code::{generate_default, is_valid_custom_code, normalize};
use relay_crypto::HashedId;

/// Draw a fresh ephemeral code, retrying on collision against the live-code
/// set. No fixed retry cap: the alphabet/length combination makes the
/// collision probability vanishing, and a bounded loop would just convert
/// an astronomically rare case into a hard failure.
pub async fn allocate_ephemeral(credits: &dyn CreditRepository) -> Result<String> {
    loop {
        let candidate = generate_default();
        if !credits.is_code_taken(&candidate).await? {
            return Ok(candidate);
        }
    }
}

/// Mint a new permanent code for `owner`, requiring tier >= PERM_CODE.
async fn allocate_permanent(credits: &dyn CreditRepository, owner: &HashedId, credit: i64) -> Result<String> {
    if tier_for_credit(credit) < PERMANENT_CODE_MIN_TIER {
        return Err(RelayError::InsufficientTier);
    }
    loop {
        let candidate = generate_default();
        if !credits.is_code_taken(&candidate).await? {
            credits
                .set_permanent_code(owner, Some(candidate.clone()))
                .await?;
            return Ok(candidate);
        }
    }
}

/// Toggle the permanent-code feature: if the owner holds any stored code
/// (permanent or custom), clear both; otherwise mint a new permanent code.
pub async fn toggle_permanent_code(
    credits: &dyn CreditRepository,
    owner: &HashedId,
    owner_credit: i64,
    current_permanent: Option<&str>,
    current_custom: Option<&str>,
) -> Result<Option<String>> {
    if current_permanent.is_some() || current_custom.is_some() {
        credits.set_permanent_code(owner, None).await?;
        credits.set_custom_code(owner, None).await?;
        Ok(None)
    } else {
        let code = allocate_permanent(credits, owner, owner_credit).await?;
        Ok(Some(code))
    }
}

/// Set a user-supplied custom code, requiring tier >= CUSTOM_CODE and
/// global uniqueness across every code column.
pub async fn set_custom_code(
    credits: &dyn CreditRepository,
    owner: &HashedId,
    owner_credit: i64,
    requested: &str,
) -> Result<String> {
    if tier_for_credit(owner_credit) < CUSTOM_CODE_MIN_TIER {
        return Err(RelayError::InsufficientTier);
    }
    let normalized = normalize(requested);
    if !is_valid_custom_code(&normalized) {
        return Err(RelayError::BadCustomCode);
    }
    if credits.is_code_taken(&normalized).await? {
        return Err(RelayError::BadCustomCode);
    }
    credits
        .set_custom_code(owner, Some(normalized.clone()))
        .await?;
    Ok(normalized)
}
