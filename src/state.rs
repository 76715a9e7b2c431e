use std::sync::Arc;

use time::OffsetDateTime;
use tracing::info;

use crate::config::Config;
use crate::db::{
    account_repository::AccountRepository, meal_plan_repository::MealPlanRepository,
};
use crate::models::account::Account;
use crate::services::generator::MealGenerator;
use crate::services::razorpay::RazorpayService;
use crate::utils::jwt::JwtKeys;

#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<dyn AccountRepository>,
    pub meal_plans: Arc<dyn MealPlanRepository>,
    pub razorpay: Arc<dyn RazorpayService>,
    pub generator: Arc<dyn MealGenerator>,
    pub config: Arc<Config>,
    pub jwt_keys: Arc<JwtKeys>,
}

impl AppState {
    /// Fetch the account for an identity, minting the default Free record on
    /// first sight. A lost insert race falls back to the winner's row.
    pub async fn resolve_account(
        &self,
        external_id: &str,
        now: OffsetDateTime,
    ) -> Result<Account, sqlx::Error> {
        if let Some(account) = self.accounts.find_by_external_id(external_id).await? {
            return Ok(account);
        }

        let account = Account::new(external_id, now);
        match self.accounts.insert(&account).await {
            Ok(()) => {
                info!(%external_id, "provisioned new free account");
                Ok(account)
            }
            Err(insert_err) => match self.accounts.find_by_external_id(external_id).await? {
                Some(existing) => Ok(existing),
                None => Err(insert_err),
            },
        }
    }
}

#[cfg(test)]
pub mod test_support {
    use std::sync::Arc;

    use super::AppState;
    use crate::config::{Config, GeneratorSettings, RazorpaySettings};
    use crate::db::mock_db::{MockAccountRepository, MockMealPlanRepository};
    use crate::services::generator::MockMealGenerator;
    use crate::services::razorpay::MockRazorpayService;
    use crate::utils::jwt::JwtKeys;

    pub const TEST_WEBHOOK_SECRET: &str = "0123456789abcdef0123456789ABCDEF";
    pub const TEST_KEY_SECRET: &str = "rzp_test_key_secret";

    pub fn test_config() -> Arc<Config> {
        Arc::new(Config {
            database_url: String::new(),
            frontend_origin: "https://app.example.com".into(),
            jwt_issuer: "test-issuer".into(),
            jwt_audience: "test-audience".into(),
            razorpay: RazorpaySettings {
                key_id: "rzp_test_key_id".into(),
                key_secret: TEST_KEY_SECRET.into(),
                webhook_secret: TEST_WEBHOOK_SECRET.into(),
                plan_ids: vec!["plan_pro_monthly".into(), "plan_pro_yearly".into()],
            },
            generator: GeneratorSettings {
                api_key: "sk-test".into(),
                model: "test-model".into(),
                api_base: "https://generator.invalid/v1".into(),
            },
        })
    }

    pub fn test_jwt_keys() -> Arc<JwtKeys> {
        Arc::new(
            JwtKeys::from_secret("0123456789abcdef0123456789abcdef")
                .expect("test JWT secret should be valid"),
        )
    }

    pub fn test_state() -> AppState {
        test_state_with(
            Arc::new(MockAccountRepository::default()),
            Arc::new(MockMealPlanRepository::default()),
            Arc::new(MockRazorpayService::new()),
            Arc::new(MockMealGenerator::new()),
        )
    }

    pub fn test_state_with(
        accounts: Arc<MockAccountRepository>,
        meal_plans: Arc<MockMealPlanRepository>,
        razorpay: Arc<MockRazorpayService>,
        generator: Arc<MockMealGenerator>,
    ) -> AppState {
        AppState {
            accounts,
            meal_plans,
            razorpay,
            generator,
            config: test_config(),
            jwt_keys: test_jwt_keys(),
        }
    }
}
