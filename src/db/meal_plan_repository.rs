use async_trait::async_trait;

use crate::models::meal_plan::MealPlan;

#[async_trait]
pub trait MealPlanRepository: Send + Sync {
    async fn insert(&self, plan: &MealPlan) -> Result<(), sqlx::Error>;

    /// Plans for one account, newest first.
    async fn list_for_account(&self, external_id: &str) -> Result<Vec<MealPlan>, sqlx::Error>;
}
