use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("generative service error: {0}")]
    Api(String),
    #[error("generator returned malformed plan: {0}")]
    Serde(String),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MealPlanRequest {
    pub goal: String,
    pub dietary_preference: String,
}

/// Opaque, fallible meal-plan generator. The application treats the returned
/// value as a finished document; it never edits or interprets it beyond
/// persisting and serving it back.
#[async_trait]
pub trait MealGenerator: Send + Sync {
    async fn generate_plan(
        &self,
        request: &MealPlanRequest,
    ) -> Result<serde_json::Value, GeneratorError>;
}

mod live;
mod mock;

#[allow(unused_imports)]
pub use live::LiveMealGenerator;
#[allow(unused_imports)]
pub use mock::MockMealGenerator;
