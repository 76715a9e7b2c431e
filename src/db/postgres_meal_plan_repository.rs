use async_trait::async_trait;
use sqlx::PgPool;

use super::meal_plan_repository::MealPlanRepository;
use crate::models::meal_plan::MealPlan;

pub struct PostgresMealPlanRepository {
    pub pool: PgPool,
}

#[async_trait]
impl MealPlanRepository for PostgresMealPlanRepository {
    async fn insert(&self, plan: &MealPlan) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO meal_plans
                (id, account_external_id, goal, dietary_preference, plan, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(plan.id)
        .bind(&plan.account_external_id)
        .bind(&plan.goal)
        .bind(&plan.dietary_preference)
        .bind(&plan.plan)
        .bind(plan.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_account(&self, external_id: &str) -> Result<Vec<MealPlan>, sqlx::Error> {
        sqlx::query_as::<_, MealPlan>(
            r#"
            SELECT id, account_external_id, goal, dietary_preference, plan, created_at
            FROM meal_plans
            WHERE account_external_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(external_id)
        .fetch_all(&self.pool)
        .await
    }
}
