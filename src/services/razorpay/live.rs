#![allow(dead_code)]
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{ProviderSubscription, RazorpayError, RazorpayService};

const DEFAULT_API_BASE: &str = "https://api.razorpay.com/v1";

pub struct LiveRazorpayService {
    client: reqwest::Client,
    key_id: String,
    key_secret: String,
    api_base: String,
}

#[derive(Deserialize)]
struct SubscriptionResponse {
    id: String,
    status: String,
    short_url: Option<String>,
}

impl LiveRazorpayService {
    pub fn new(key_id: impl Into<String>, key_secret: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            key_id: key_id.into(),
            key_secret: key_secret.into(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    pub fn from_settings(settings: &crate::config::RazorpaySettings) -> Self {
        Self::new(settings.key_id.clone(), settings.key_secret.clone())
    }

    /// Point the client at a non-default API host (test servers).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    async fn parse_subscription(
        &self,
        response: reqwest::Response,
    ) -> Result<ProviderSubscription, RazorpayError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RazorpayError::Api(format!("{status}: {body}")));
        }
        let sub: SubscriptionResponse = response
            .json()
            .await
            .map_err(|e| RazorpayError::Serde(e.to_string()))?;
        Ok(ProviderSubscription {
            id: sub.id,
            status: sub.status,
            short_url: sub.short_url,
        })
    }
}

#[async_trait]
impl RazorpayService for LiveRazorpayService {
    async fn create_subscription(
        &self,
        plan_id: &str,
    ) -> Result<ProviderSubscription, RazorpayError> {
        let response = self
            .client
            .post(format!("{}/subscriptions", self.api_base))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&json!({
                "plan_id": plan_id,
                "total_count": 12,
                "customer_notify": 1,
            }))
            .send()
            .await
            .map_err(|e| RazorpayError::Api(e.to_string()))?;

        self.parse_subscription(response).await
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), RazorpayError> {
        let response = self
            .client
            .post(format!(
                "{}/subscriptions/{}/cancel",
                self.api_base, subscription_id
            ))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&json!({ "cancel_at_cycle_end": 0 }))
            .send()
            .await
            .map_err(|e| RazorpayError::Api(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RazorpayError::Api(format!("{status}: {body}")));
        }
        Ok(())
    }
}
