use async_trait::async_trait;
use sqlx::PgPool;

use super::account_repository::AccountRepository;
use crate::models::account::Account;

pub struct PostgresAccountRepository {
    pub pool: PgPool,
}

#[async_trait]
impl AccountRepository for PostgresAccountRepository {
    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Account>, sqlx::Error> {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT external_id, tier, token_balance, token_reset_at,
                   subscription_id, subscription_status, created_at, updated_at
            FROM accounts
            WHERE external_id = $1
            "#,
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn find_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Account>, sqlx::Error> {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT external_id, tier, token_balance, token_reset_at,
                   subscription_id, subscription_status, created_at, updated_at
            FROM accounts
            WHERE subscription_id = $1
            "#,
        )
        .bind(subscription_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn insert(&self, account: &Account) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO accounts
                (external_id, tier, token_balance, token_reset_at,
                 subscription_id, subscription_status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&account.external_id)
        .bind(account.tier)
        .bind(account.token_balance)
        .bind(account.token_reset_at)
        .bind(&account.subscription_id)
        .bind(account.subscription_status)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn save(&self, account: &Account) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET tier = $2,
                token_balance = $3,
                token_reset_at = $4,
                subscription_id = $5,
                subscription_status = $6,
                updated_at = $7
            WHERE external_id = $1
            "#,
        )
        .bind(&account.external_id)
        .bind(account.tier)
        .bind(account.token_balance)
        .bind(account.token_reset_at)
        .bind(&account.subscription_id)
        .bind(account.subscription_status)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_if_balance(
        &self,
        account: &Account,
        expected_balance: i32,
    ) -> Result<bool, sqlx::Error> {
        // Single conditional write keyed on the pre-read balance; a racing
        // consumption makes the predicate fail instead of double-spending.
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET tier = $2,
                token_balance = $3,
                token_reset_at = $4,
                subscription_id = $5,
                subscription_status = $6,
                updated_at = $7
            WHERE external_id = $1 AND token_balance = $8
            "#,
        )
        .bind(&account.external_id)
        .bind(account.tier)
        .bind(account.token_balance)
        .bind(account.token_reset_at)
        .bind(&account.subscription_id)
        .bind(account.subscription_status)
        .bind(account.updated_at)
        .bind(expected_balance)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
