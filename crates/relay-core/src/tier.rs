//! Tier derivation and quota tables.
//!
//! The original scatters its credit-cutoff/tier/quota arithmetic across
//! `pro.go` and ad-hoc helpers in `user.go`. Kept here as one ordered
//! table so every quota derivation goes through the same rule.

use crate::types::Tier;

/// One row of the tier table: the minimum cumulative credit required to
/// reach this tier, the session length it grants, the daily bandwidth
/// quota, and the max single-upload size. Bandwidth/file-size scale
/// linearly with credit beyond the row's floor, up to the next row.
struct TierRow {
    tier: Tier,
    credit_floor: i64,
    base_minutes: i64,
    base_bandwidth_bytes: i64,
    base_max_file_bytes: i64,
    /// Extra bandwidth bytes granted per credit unit above the floor.
    bandwidth_per_credit: i64,
    /// Extra max-file-size bytes granted per credit unit above the floor.
    max_file_per_credit: i64,
}

const TABLE: &[TierRow] = &[
    TierRow {
        tier: Tier::Free,
        credit_floor: 0,
        base_minutes: 10,
        base_bandwidth_bytes: 100 * 1024 * 1024,
        base_max_file_bytes: 50 * 1024 * 1024,
        bandwidth_per_credit: 0,
        max_file_per_credit: 0,
    },
    TierRow {
        tier: Tier::Paid,
        credit_floor: 1,
        base_minutes: 30,
        base_bandwidth_bytes: 1024 * 1024 * 1024,
        base_max_file_bytes: 500 * 1024 * 1024,
        bandwidth_per_credit: 50 * 1024 * 1024,
        max_file_per_credit: 10 * 1024 * 1024,
    },
    TierRow {
        tier: Tier::PermCode,
        credit_floor: 50,
        base_minutes: 60,
        base_bandwidth_bytes: 5 * 1024 * 1024 * 1024,
        base_max_file_bytes: 2 * 1024 * 1024 * 1024,
        bandwidth_per_credit: 100 * 1024 * 1024,
        max_file_per_credit: 20 * 1024 * 1024,
    },
    TierRow {
        tier: Tier::CustomCode,
        credit_floor: 200,
        base_minutes: 120,
        base_bandwidth_bytes: 20 * 1024 * 1024 * 1024,
        base_max_file_bytes: 10 * 1024 * 1024 * 1024,
        bandwidth_per_credit: 200 * 1024 * 1024,
        max_file_per_credit: 50 * 1024 * 1024,
    },
];

fn row_for_credit(credit: i64) -> &'static TierRow {
    TABLE
        .iter()
        .rev()
        .find(|row| credit >= row.credit_floor)
        .unwrap_or(&TABLE[0])
}

/// Derive the tier from cumulative credit: the highest tier whose floor is
/// met, ties resolved upward.
pub fn tier_for_credit(credit: i64) -> Tier {
    row_for_credit(credit).tier
}

/// Session minutes permitted at this credit level.
pub fn minutes_allowed(credit: i64) -> i64 {
    row_for_credit(credit).base_minutes
}

/// Daily bandwidth quota at this credit level, scaling linearly with
/// credit above the tier floor.
pub fn bandwidth_quota(credit: i64) -> i64 {
    let row = row_for_credit(credit);
    let over = (credit - row.credit_floor).max(0);
    row.base_bandwidth_bytes + over * row.bandwidth_per_credit
}

/// Max single-upload size at this credit level, scaling linearly with
/// credit above the tier floor.
pub fn max_file_size(credit: i64) -> i64 {
    let row = row_for_credit(credit);
    let over = (credit - row.credit_floor).max(0);
    row.base_max_file_bytes + over * row.max_file_per_credit
}

/// Minimum tier required to mint/hold a permanent code.
pub const PERMANENT_CODE_MIN_TIER: Tier = Tier::PermCode;

/// Minimum tier required to set a custom code.
pub const CUSTOM_CODE_MIN_TIER: Tier = Tier::CustomCode;
