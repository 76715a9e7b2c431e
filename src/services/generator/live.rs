#![allow(dead_code)]
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{GeneratorError, MealGenerator, MealPlanRequest};

pub struct LiveMealGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    api_base: String,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: String,
}

impl LiveMealGenerator {
    pub fn from_settings(settings: &crate::config::GeneratorSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            api_base: settings.api_base.clone(),
        }
    }

    fn build_prompt(request: &MealPlanRequest) -> String {
        format!(
            "Create a 7-day meal plan for the goal \"{}\" with dietary preference \"{}\". \
             Respond with a single JSON object: {{\"days\": [{{\"day\": string, \
             \"meals\": [{{\"name\": string, \"items\": [string], \"calories\": number}}]}}], \
             \"daily_calories\": number}}. No prose outside the JSON.",
            request.goal, request.dietary_preference
        )
    }
}

#[async_trait]
impl MealGenerator for LiveMealGenerator {
    async fn generate_plan(
        &self,
        request: &MealPlanRequest,
    ) -> Result<serde_json::Value, GeneratorError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "response_format": { "type": "json_object" },
                "messages": [
                    { "role": "user", "content": Self::build_prompt(request) }
                ],
            }))
            .send()
            .await
            .map_err(|e| GeneratorError::Api(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeneratorError::Api(format!("{status}: {body}")));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| GeneratorError::Serde(e.to_string()))?;
        let content = completion
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| GeneratorError::Serde("empty completion".into()))?;

        serde_json::from_str(content).map_err(|e| GeneratorError::Serde(e.to_string()))
    }
}
