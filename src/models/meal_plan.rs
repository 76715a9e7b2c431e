use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// A generated meal plan, persisted verbatim as the generator returned it.
#[derive(Debug, FromRow, Serialize, Deserialize, Clone)]
pub struct MealPlan {
    pub id: Uuid,
    pub account_external_id: String,
    pub goal: String,
    pub dietary_preference: String,
    pub plan: serde_json::Value,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl MealPlan {
    pub fn new(
        account_external_id: &str,
        goal: &str,
        dietary_preference: &str,
        plan: serde_json::Value,
        now: OffsetDateTime,
    ) -> Self {
        MealPlan {
            id: Uuid::new_v4(),
            account_external_id: account_external_id.to_string(),
            goal: goal.to_string(),
            dietary_preference: dietary_preference.to_string(),
            plan,
            created_at: now,
        }
    }
}
