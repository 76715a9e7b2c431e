use core::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::entitlement::{start_of_next_month, FREE_MONTHLY_TOKENS};

#[derive(sqlx::Type, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[sqlx(type_name = "account_tier", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Pro,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Pro => "pro",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(sqlx::Type, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[sqlx(type_name = "subscription_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Inactive,
    Canceled,
}

/// Per-user entitlement record, keyed by the identity provider's stable id.
///
/// Field invariants are maintained exclusively by the operations in
/// `crate::entitlement`; nothing else writes `tier`, `token_balance`,
/// `token_reset_at`, `subscription_id` or `subscription_status`.
#[derive(Debug, FromRow, Serialize, Deserialize, Clone, PartialEq)]
pub struct Account {
    pub external_id: String,
    pub tier: Tier,
    pub token_balance: i32,
    #[serde(with = "time::serde::rfc3339::option")]
    pub token_reset_at: Option<OffsetDateTime>,
    pub subscription_id: Option<String>,
    pub subscription_status: SubscriptionStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Account {
    /// A fresh Free account as minted on first sight of an identity.
    pub fn new(external_id: &str, now: OffsetDateTime) -> Self {
        Account {
            external_id: external_id.to_string(),
            tier: Tier::Free,
            token_balance: FREE_MONTHLY_TOKENS,
            token_reset_at: Some(start_of_next_month(now)),
            subscription_id: None,
            subscription_status: SubscriptionStatus::Inactive,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Remaining allowance as seen by the status endpoint. Pro accounts are
/// unlimited; there is deliberately no numeric sentinel for "infinite".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "count", rename_all = "lowercase")]
pub enum TokensRemaining {
    Unlimited,
    Remaining(i32),
}
