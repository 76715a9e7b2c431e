#![allow(dead_code)]
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::account_repository::AccountRepository;
use super::meal_plan_repository::MealPlanRepository;
use crate::models::account::Account;
use crate::models::meal_plan::MealPlan;

/// In-memory account store used by tests and local wiring. CAS semantics
/// mirror the Postgres conditional update: the write lands only when the
/// stored balance still matches the caller's pre-read value.
#[derive(Default)]
pub struct MockAccountRepository {
    pub accounts: Mutex<HashMap<String, Account>>,
    pub should_fail: bool,
    pub save_calls: Mutex<usize>,
    pub cas_rejections: Mutex<usize>,
}

impl MockAccountRepository {
    pub fn with_account(account: Account) -> Self {
        let repo = Self::default();
        repo.accounts
            .lock()
            .unwrap()
            .insert(account.external_id.clone(), account);
        repo
    }

    pub fn get(&self, external_id: &str) -> Option<Account> {
        self.accounts.lock().unwrap().get(external_id).cloned()
    }
}

#[async_trait]
impl AccountRepository for MockAccountRepository {
    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Account>, sqlx::Error> {
        if self.should_fail {
            return Err(sqlx::Error::Protocol("mock account store failure".into()));
        }
        Ok(self.get(external_id))
    }

    async fn find_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Account>, sqlx::Error> {
        if self.should_fail {
            return Err(sqlx::Error::Protocol("mock account store failure".into()));
        }
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .values()
            .find(|a| a.subscription_id.as_deref() == Some(subscription_id))
            .cloned())
    }

    async fn insert(&self, account: &Account) -> Result<(), sqlx::Error> {
        if self.should_fail {
            return Err(sqlx::Error::Protocol("mock account store failure".into()));
        }
        self.accounts
            .lock()
            .unwrap()
            .insert(account.external_id.clone(), account.clone());
        Ok(())
    }

    async fn save(&self, account: &Account) -> Result<(), sqlx::Error> {
        if self.should_fail {
            return Err(sqlx::Error::Protocol("mock account store failure".into()));
        }
        *self.save_calls.lock().unwrap() += 1;
        self.accounts
            .lock()
            .unwrap()
            .insert(account.external_id.clone(), account.clone());
        Ok(())
    }

    async fn update_if_balance(
        &self,
        account: &Account,
        expected_balance: i32,
    ) -> Result<bool, sqlx::Error> {
        if self.should_fail {
            return Err(sqlx::Error::Protocol("mock account store failure".into()));
        }
        let mut accounts = self.accounts.lock().unwrap();
        match accounts.get(&account.external_id) {
            Some(stored) if stored.token_balance == expected_balance => {
                accounts.insert(account.external_id.clone(), account.clone());
                Ok(true)
            }
            Some(_) => {
                *self.cas_rejections.lock().unwrap() += 1;
                Ok(false)
            }
            None => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct MockMealPlanRepository {
    pub plans: Mutex<Vec<MealPlan>>,
    pub should_fail: bool,
}

#[async_trait]
impl MealPlanRepository for MockMealPlanRepository {
    async fn insert(&self, plan: &MealPlan) -> Result<(), sqlx::Error> {
        if self.should_fail {
            return Err(sqlx::Error::Protocol("mock plan store failure".into()));
        }
        self.plans.lock().unwrap().push(plan.clone());
        Ok(())
    }

    async fn list_for_account(&self, external_id: &str) -> Result<Vec<MealPlan>, sqlx::Error> {
        if self.should_fail {
            return Err(sqlx::Error::Protocol("mock plan store failure".into()));
        }
        let mut plans: Vec<MealPlan> = self
            .plans
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.account_external_id == external_id)
            .cloned()
            .collect();
        plans.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(plans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[tokio::test]
    async fn cas_rejects_a_stale_balance_and_leaves_the_record_alone() {
        let now = datetime!(2025-03-14 12:00:00 UTC);
        let stored = Account::new("user_cas", now);
        let repo = MockAccountRepository::with_account(stored.clone());

        // Another writer got there first: the stored balance is 10, but this
        // writer read 9 before mutating.
        let mut stale = stored.clone();
        stale.token_balance = 8;
        let applied = repo.update_if_balance(&stale, 9).await.unwrap();

        assert!(!applied);
        assert_eq!(repo.get("user_cas").unwrap().token_balance, 10);
        assert_eq!(*repo.cas_rejections.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn cas_applies_when_the_expected_balance_matches() {
        let now = datetime!(2025-03-14 12:00:00 UTC);
        let stored = Account::new("user_cas", now);
        let repo = MockAccountRepository::with_account(stored.clone());

        let mut updated = stored.clone();
        updated.token_balance = 9;
        let applied = repo.update_if_balance(&updated, 10).await.unwrap();

        assert!(applied);
        assert_eq!(repo.get("user_cas").unwrap().token_balance, 9);
    }
}
