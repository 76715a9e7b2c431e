//! Tier and token bookkeeping for accounts.
//!
//! Every transition between Free and Pro, every token consumption and every
//! monthly reset goes through the functions in this module. They are pure
//! value transformations over an [`Account`]: the caller supplies `now` and
//! is responsible for persisting the mutated record, which keeps the reset
//! boundary deterministic under test.

use serde::Serialize;
use thiserror::Error;
use time::{Date, Month, OffsetDateTime};

use crate::models::account::{Account, SubscriptionStatus, Tier, TokensRemaining};

/// Monthly allowance granted to Free accounts.
pub const FREE_MONTHLY_TOKENS: i32 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntitlementError {
    #[error("monthly token allowance exhausted")]
    OutOfTokens,
}

/// First instant of the next calendar month, midnight in `now`'s offset.
///
/// This is the only place the reset boundary is computed; account creation,
/// the lazy reset and downgrade all call it, so they cannot drift apart.
/// Resets align to calendar months, not to a rolling window from signup.
pub fn start_of_next_month(now: OffsetDateTime) -> OffsetDateTime {
    let date = now.date();
    let (year, month) = match date.month() {
        Month::December => (date.year() + 1, Month::January),
        month => (date.year(), month.next()),
    };
    Date::from_calendar_date(year, month, 1)
        .expect("day 1 exists in every month")
        .midnight()
        .assume_offset(now.offset())
}

/// Refill the allowance when the boundary has passed. No-op for Pro.
///
/// Must run before any read or decrement of `token_balance`; callers never
/// trust a stale balance. Returns whether the account was mutated so callers
/// know a write-back is needed. Idempotent until the next boundary.
pub fn reset_if_due(account: &mut Account, now: OffsetDateTime) -> bool {
    if account.tier != Tier::Free {
        return false;
    }
    let due = match account.token_reset_at {
        None => true,
        Some(reset_at) => now >= reset_at,
    };
    if !due {
        return false;
    }
    account.token_balance = FREE_MONTHLY_TOKENS;
    account.token_reset_at = Some(start_of_next_month(now));
    account.updated_at = now;
    true
}

/// Spend one token, refreshing the allowance first. Pro is unlimited.
///
/// At zero balance this fails without mutating anything; the caller must not
/// issue the downstream generation call in that case.
pub fn consume_token(account: &mut Account, now: OffsetDateTime) -> Result<(), EntitlementError> {
    reset_if_due(account, now);
    if account.tier == Tier::Pro {
        return Ok(());
    }
    if account.token_balance == 0 {
        return Err(EntitlementError::OutOfTokens);
    }
    account.token_balance -= 1;
    account.updated_at = now;
    Ok(())
}

/// Promote to Pro against a provider subscription. Unconditional: calling it
/// on an account that is already Pro simply overwrites the subscription id.
pub fn upgrade_to_pro(account: &mut Account, subscription_id: &str, now: OffsetDateTime) {
    account.tier = Tier::Pro;
    account.subscription_id = Some(subscription_id.to_string());
    account.subscription_status = SubscriptionStatus::Active;
    account.token_reset_at = None;
    account.updated_at = now;
}

/// Drop back to Free with a full allowance and a fresh reset boundary.
/// Unconditional from either tier.
pub fn downgrade_to_free(account: &mut Account, now: OffsetDateTime) {
    account.tier = Tier::Free;
    account.subscription_id = None;
    account.subscription_status = SubscriptionStatus::Inactive;
    account.token_balance = FREE_MONTHLY_TOKENS;
    account.token_reset_at = Some(start_of_next_month(now));
    account.updated_at = now;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub tokens_remaining: TokensRemaining,
    pub tier: Tier,
    pub subscription_status: SubscriptionStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub token_reset_at: Option<OffsetDateTime>,
}

/// Read-only projection of the entitlement state. Runs the lazy reset first,
/// so the caller should persist the account when that fired.
pub fn status_snapshot(account: &mut Account, now: OffsetDateTime) -> StatusSnapshot {
    reset_if_due(account, now);
    StatusSnapshot {
        tokens_remaining: match account.tier {
            Tier::Pro => TokensRemaining::Unlimited,
            Tier::Free => TokensRemaining::Remaining(account.token_balance),
        },
        tier: account.tier,
        subscription_status: account.subscription_status,
        token_reset_at: account.token_reset_at,
    }
}
