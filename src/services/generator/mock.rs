#![allow(dead_code)]
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use super::{GeneratorError, MealGenerator, MealPlanRequest};

#[derive(Clone)]
pub struct MockMealGenerator {
    pub requests: Arc<Mutex<Vec<MealPlanRequest>>>,
    pub fail_requests: Arc<Mutex<bool>>,
    pub canned_plan: serde_json::Value,
}

impl Default for MockMealGenerator {
    fn default() -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            fail_requests: Arc::new(Mutex::new(false)),
            canned_plan: serde_json::json!({
                "days": [
                    { "day": "Monday", "meals": [
                        { "name": "Breakfast", "items": ["oats", "banana"], "calories": 420 }
                    ]}
                ],
                "daily_calories": 2000
            }),
        }
    }
}

impl MockMealGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(self) -> Self {
        *self.fail_requests.lock().unwrap() = true;
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl MealGenerator for MockMealGenerator {
    async fn generate_plan(
        &self,
        request: &MealPlanRequest,
    ) -> Result<serde_json::Value, GeneratorError> {
        self.requests.lock().unwrap().push(request.clone());
        if *self.fail_requests.lock().unwrap() {
            return Err(GeneratorError::Api("mock generator unavailable".into()));
        }
        Ok(self.canned_plan.clone())
    }
}
