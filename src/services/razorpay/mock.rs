#![allow(dead_code)]
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use super::{ProviderSubscription, RazorpayError, RazorpayService};

#[derive(Clone, Default)]
pub struct MockRazorpayService {
    pub created_plans: Arc<Mutex<Vec<String>>>,
    pub cancelled_subscriptions: Arc<Mutex<Vec<String>>>,
    pub fail_requests: Arc<Mutex<bool>>,
    next_id: Arc<Mutex<u32>>,
}

impl MockRazorpayService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(self) -> Self {
        *self.fail_requests.lock().unwrap() = true;
        self
    }

    pub fn create_calls(&self) -> usize {
        self.created_plans.lock().unwrap().len()
    }
}

#[async_trait]
impl RazorpayService for MockRazorpayService {
    async fn create_subscription(
        &self,
        plan_id: &str,
    ) -> Result<ProviderSubscription, RazorpayError> {
        self.created_plans.lock().unwrap().push(plan_id.to_string());
        if *self.fail_requests.lock().unwrap() {
            return Err(RazorpayError::Api("mock provider unavailable".into()));
        }
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        Ok(ProviderSubscription {
            id: format!("sub_test_{:06}", *next),
            status: "created".into(),
            short_url: Some("https://rzp.test/checkout".into()),
        })
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), RazorpayError> {
        if *self.fail_requests.lock().unwrap() {
            return Err(RazorpayError::Api("mock provider unavailable".into()));
        }
        self.cancelled_subscriptions
            .lock()
            .unwrap()
            .push(subscription_id.to_string());
        Ok(())
    }
}
