use std::env;

pub struct RazorpaySettings {
    pub key_id: String,
    pub key_secret: String,
    pub webhook_secret: String,
    /// Provider plan ids we are willing to create subscriptions for.
    /// Anything outside this list is rejected before the provider is called.
    pub plan_ids: Vec<String>,
}

impl RazorpaySettings {
    pub fn is_known_plan(&self, plan_id: &str) -> bool {
        self.plan_ids.iter().any(|p| p == plan_id)
    }
}

pub struct GeneratorSettings {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
}

pub struct Config {
    pub database_url: String,
    pub frontend_origin: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub razorpay: RazorpaySettings,
    pub generator: GeneratorSettings,
}

fn parse_plan_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok(); // Load .env file

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let frontend_origin = env::var("FRONTEND_ORIGIN").expect("FRONTEND_ORIGIN must be set");
        let jwt_issuer = env::var("JWT_ISSUER").expect("JWT_ISSUER must be set");
        let jwt_audience = env::var("JWT_AUDIENCE").expect("JWT_AUDIENCE must be set");

        let razorpay = RazorpaySettings {
            key_id: env::var("RAZORPAY_KEY_ID").expect("RAZORPAY_KEY_ID must be set"),
            key_secret: env::var("RAZORPAY_KEY_SECRET").expect("RAZORPAY_KEY_SECRET must be set"),
            webhook_secret: env::var("RAZORPAY_WEBHOOK_SECRET")
                .expect("RAZORPAY_WEBHOOK_SECRET must be set"),
            plan_ids: parse_plan_ids(
                &env::var("RAZORPAY_PLAN_IDS").expect("RAZORPAY_PLAN_IDS must be set"),
            ),
        };

        let generator = GeneratorSettings {
            api_key: env::var("GENERATOR_API_KEY").expect("GENERATOR_API_KEY must be set"),
            model: env::var("GENERATOR_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            api_base: env::var("GENERATOR_API_BASE")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
        };

        Config {
            database_url,
            frontend_origin,
            jwt_issuer,
            jwt_audience,
            razorpay,
            generator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_ids_parse_with_whitespace_and_empties_stripped() {
        let plans = parse_plan_ids("plan_pro_monthly, plan_pro_yearly ,,plan_promo");
        assert_eq!(plans, vec!["plan_pro_monthly", "plan_pro_yearly", "plan_promo"]);
    }

    #[test]
    fn allow_list_matches_exact_ids_only() {
        let settings = RazorpaySettings {
            key_id: "rzp_test".into(),
            key_secret: "secret".into(),
            webhook_secret: "whsec".into(),
            plan_ids: parse_plan_ids("plan_pro_monthly,plan_pro_yearly"),
        };
        assert!(settings.is_known_plan("plan_pro_monthly"));
        assert!(!settings.is_known_plan("plan_pro"));
        assert!(!settings.is_known_plan("not_a_real_plan"));
    }
}
