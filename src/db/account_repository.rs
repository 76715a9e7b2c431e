use async_trait::async_trait;

use crate::models::account::Account;

/// Store for the per-user entitlement record.
///
/// `update_if_balance` is the compare-and-swap used on the token consumption
/// path: the write only lands when the stored balance still equals the value
/// the caller read, so two racing consumptions cannot both decrement the same
/// token. Webhook-driven transitions mirror provider state and go through the
/// plain `save`.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn find_by_external_id(&self, external_id: &str)
        -> Result<Option<Account>, sqlx::Error>;

    async fn find_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Account>, sqlx::Error>;

    async fn insert(&self, account: &Account) -> Result<(), sqlx::Error>;

    async fn save(&self, account: &Account) -> Result<(), sqlx::Error>;

    /// Persist `account` only if the stored `token_balance` still equals
    /// `expected_balance`. Returns whether the write was applied.
    async fn update_if_balance(
        &self,
        account: &Account,
        expected_balance: i32,
    ) -> Result<bool, sqlx::Error>;
}
