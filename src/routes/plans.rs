use axum::{extract::State, http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::entitlement::{self, EntitlementError};
use crate::models::meal_plan::MealPlan;
use crate::responses::JsonResponse;
use crate::services::generator::MealPlanRequest;
use crate::session::AuthSession;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GeneratePlanPayload {
    pub goal: String,
    pub dietary_preference: String,
}

// Bounded retries for the balance compare-and-swap; each round re-reads the
// record, so losing the race more often than this means the store is unwell.
const MAX_CONSUME_ATTEMPTS: usize = 3;

/// POST /api/plans — the generation gate.
///
/// Token accounting is settled before the generator is contacted: a rejected
/// consumption never issues the generative call, and a generator failure
/// after a successful consumption leaves the token spent.
pub async fn generate_plan(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Json(payload): Json<GeneratePlanPayload>,
) -> Response {
    let now = OffsetDateTime::now_utc();
    let mut account = match app_state.resolve_account(&claims.sub, now).await {
        Ok(account) => account,
        Err(err) => {
            error!(?err, external_id = %claims.sub, "failed to load account for generation");
            return JsonResponse::server_error("Could not load your account").into_response();
        }
    };

    let mut attempts = 0;
    let account = loop {
        let observed_balance = account.token_balance;
        let mut candidate = account.clone();
        if let Err(EntitlementError::OutOfTokens) =
            entitlement::consume_token(&mut candidate, now)
        {
            return JsonResponse::forbidden_with_code(
                "You are out of tokens for this month. Upgrade to Pro or wait for the reset.",
                "insufficient-entitlement",
            )
            .into_response();
        }

        match app_state
            .accounts
            .update_if_balance(&candidate, observed_balance)
            .await
        {
            Ok(true) => break candidate,
            Ok(false) => {
                attempts += 1;
                if attempts >= MAX_CONSUME_ATTEMPTS {
                    warn!(external_id = %claims.sub, "token consumption kept losing the balance race");
                    return JsonResponse::server_error("Could not reserve a token, please retry")
                        .into_response();
                }
                account = match app_state.accounts.find_by_external_id(&claims.sub).await {
                    Ok(Some(account)) => account,
                    Ok(None) => {
                        error!(external_id = %claims.sub, "account vanished during token consumption");
                        return JsonResponse::server_error("Could not load your account")
                            .into_response();
                    }
                    Err(err) => {
                        error!(?err, external_id = %claims.sub, "failed to re-read account after lost race");
                        return JsonResponse::server_error("Could not load your account")
                            .into_response();
                    }
                };
            }
            Err(err) => {
                error!(?err, external_id = %claims.sub, "failed to persist token consumption");
                return JsonResponse::server_error("Could not reserve a token").into_response();
            }
        }
    };

    // Token is spent from here on, whatever the generator does.
    let request = MealPlanRequest {
        goal: payload.goal.clone(),
        dietary_preference: payload.dietary_preference.clone(),
    };
    let generated = match app_state.generator.generate_plan(&request).await {
        Ok(plan) => plan,
        Err(err) => {
            warn!(?err, external_id = %claims.sub, "meal plan generation failed after token spend");
            return JsonResponse::bad_gateway("Meal plan generation failed, please try again")
                .into_response();
        }
    };

    let plan = MealPlan::new(
        &claims.sub,
        &payload.goal,
        &payload.dietary_preference,
        generated,
        now,
    );
    if let Err(err) = app_state.meal_plans.insert(&plan).await {
        error!(?err, external_id = %claims.sub, plan_id = %plan.id, "failed to persist generated meal plan");
        return JsonResponse::server_error("Your plan was generated but could not be saved")
            .into_response();
    }

    info!(external_id = %claims.sub, plan_id = %plan.id, tier = %account.tier, "generated meal plan");
    (StatusCode::OK, Json(json!({ "success": true, "plan": plan }))).into_response()
}

/// GET /api/plans — the caller's saved plans, newest first.
pub async fn list_plans(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
) -> Response {
    match app_state.meal_plans.list_for_account(&claims.sub).await {
        Ok(plans) => {
            (StatusCode::OK, Json(json!({ "success": true, "plans": plans }))).into_response()
        }
        Err(err) => {
            error!(?err, external_id = %claims.sub, "failed to list meal plans");
            JsonResponse::server_error("Could not load your plans").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State as AxumState;
    use std::sync::Arc;
    use std::time::{SystemTime, UNIX_EPOCH};
    use time::macros::datetime;

    use crate::db::mock_db::{MockAccountRepository, MockMealPlanRepository};
    use crate::entitlement::FREE_MONTHLY_TOKENS;
    use crate::models::account::{Account, Tier};
    use crate::services::generator::MockMealGenerator;
    use crate::services::razorpay::MockRazorpayService;
    use crate::session::Claims;
    use crate::state::test_support::test_state_with;

    fn test_claims(sub: &str) -> Claims {
        Claims {
            sub: sub.into(),
            email: Some("test@example.com".into()),
            exp: (SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_secs()
                + 3600) as usize,
            iss: "test-issuer".into(),
            aud: "test-audience".into(),
        }
    }

    fn payload() -> GeneratePlanPayload {
        GeneratePlanPayload {
            goal: "weight loss".into(),
            dietary_preference: "vegetarian".into(),
        }
    }

    struct Fixture {
        accounts: Arc<MockAccountRepository>,
        meal_plans: Arc<MockMealPlanRepository>,
        generator: Arc<MockMealGenerator>,
        state: crate::state::AppState,
    }

    fn fixture_with_account(account: Account, generator: MockMealGenerator) -> Fixture {
        let accounts = Arc::new(MockAccountRepository::with_account(account));
        let meal_plans = Arc::new(MockMealPlanRepository::default());
        let generator = Arc::new(generator);
        let state = test_state_with(
            accounts.clone(),
            meal_plans.clone(),
            Arc::new(MockRazorpayService::new()),
            generator.clone(),
        );
        Fixture {
            accounts,
            meal_plans,
            generator,
            state,
        }
    }

    #[tokio::test]
    async fn successful_generation_spends_a_token_and_persists_the_plan() {
        let now = datetime!(2025-03-14 12:00:00 UTC);
        let fixture = fixture_with_account(Account::new("user_gen", now), MockMealGenerator::new());

        let resp = generate_plan(
            AxumState(fixture.state),
            AuthSession(test_claims("user_gen")),
            Json(payload()),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(fixture.generator.call_count(), 1);
        assert_eq!(
            fixture.accounts.get("user_gen").unwrap().token_balance,
            FREE_MONTHLY_TOKENS - 1
        );
        assert_eq!(fixture.meal_plans.plans.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn out_of_tokens_rejects_before_the_generator_is_called() {
        let now = datetime!(2025-03-14 12:00:00 UTC);
        let mut account = Account::new("user_empty", now);
        account.token_balance = 0;
        let fixture = fixture_with_account(account, MockMealGenerator::new());

        let resp = generate_plan(
            AxumState(fixture.state),
            AuthSession(test_claims("user_empty")),
            Json(payload()),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(fixture.generator.call_count(), 0);
        assert_eq!(fixture.accounts.get("user_empty").unwrap().token_balance, 0);
        assert!(fixture.meal_plans.plans.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn generator_failure_still_leaves_the_token_spent() {
        let now = datetime!(2025-03-14 12:00:00 UTC);
        let fixture = fixture_with_account(
            Account::new("user_fail", now),
            MockMealGenerator::new().failing(),
        );

        let resp = generate_plan(
            AxumState(fixture.state),
            AuthSession(test_claims("user_fail")),
            Json(payload()),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(fixture.generator.call_count(), 1);
        // Spend-before-generate: the token is gone even though no plan exists.
        assert_eq!(
            fixture.accounts.get("user_fail").unwrap().token_balance,
            FREE_MONTHLY_TOKENS - 1
        );
        assert!(fixture.meal_plans.plans.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn exhausted_account_generates_again_after_the_monthly_boundary() {
        // token_reset_at in the past: the lazy reset fires inside the gate.
        let minted = datetime!(2020-01-10 12:00:00 UTC);
        let mut account = Account::new("user_reset", minted);
        account.token_balance = 0;
        let fixture = fixture_with_account(account, MockMealGenerator::new());

        let resp = generate_plan(
            AxumState(fixture.state),
            AuthSession(test_claims("user_reset")),
            Json(payload()),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::OK);
        let stored = fixture.accounts.get("user_reset").unwrap();
        assert_eq!(stored.token_balance, FREE_MONTHLY_TOKENS - 1);
        assert!(stored.token_reset_at.unwrap() > minted);
    }

    #[tokio::test]
    async fn pro_account_generates_without_touching_the_balance() {
        let now = datetime!(2025-03-14 12:00:00 UTC);
        let mut account = Account::new("user_pro", now);
        crate::entitlement::upgrade_to_pro(&mut account, "sub_123", now);
        let fixture = fixture_with_account(account, MockMealGenerator::new());

        let resp = generate_plan(
            AxumState(fixture.state),
            AuthSession(test_claims("user_pro")),
            Json(payload()),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::OK);
        let stored = fixture.accounts.get("user_pro").unwrap();
        assert_eq!(stored.tier, Tier::Pro);
        assert_eq!(fixture.generator.call_count(), 1);
    }

    #[tokio::test]
    async fn two_racing_generations_cannot_both_spend_the_last_token() {
        let now = datetime!(2025-03-14 12:00:00 UTC);
        let mut account = Account::new("user_race", now);
        account.token_balance = 1;
        let fixture = fixture_with_account(account, MockMealGenerator::new());

        let first = generate_plan(
            AxumState(fixture.state.clone()),
            AuthSession(test_claims("user_race")),
            Json(payload()),
        );
        let second = generate_plan(
            AxumState(fixture.state.clone()),
            AuthSession(test_claims("user_race")),
            Json(payload()),
        );
        let (first, second) = tokio::join!(first, second);

        let statuses = [first.status(), second.status()];
        assert!(statuses.contains(&StatusCode::OK));
        assert!(statuses.contains(&StatusCode::FORBIDDEN));
        // The loser re-read, saw zero and was turned away: exactly one token
        // left the account and exactly one generation ran.
        assert_eq!(fixture.accounts.get("user_race").unwrap().token_balance, 0);
        assert_eq!(fixture.generator.call_count(), 1);
        assert_eq!(fixture.meal_plans.plans.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_identity_gets_an_account_provisioned_on_first_generation() {
        let accounts = Arc::new(MockAccountRepository::default());
        let meal_plans = Arc::new(MockMealPlanRepository::default());
        let generator = Arc::new(MockMealGenerator::new());
        let state = test_state_with(
            accounts.clone(),
            meal_plans,
            Arc::new(MockRazorpayService::new()),
            generator,
        );

        let resp = generate_plan(
            AxumState(state),
            AuthSession(test_claims("user_first_time")),
            Json(payload()),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            accounts.get("user_first_time").unwrap().token_balance,
            FREE_MONTHLY_TOKENS - 1
        );
    }

    #[tokio::test]
    async fn list_plans_returns_only_the_callers_plans() {
        let now = datetime!(2025-03-14 12:00:00 UTC);
        let meal_plans = Arc::new(MockMealPlanRepository::default());
        meal_plans
            .plans
            .lock()
            .unwrap()
            .push(crate::models::meal_plan::MealPlan::new(
                "user_a",
                "weight loss",
                "vegan",
                serde_json::json!({}),
                now,
            ));
        meal_plans
            .plans
            .lock()
            .unwrap()
            .push(crate::models::meal_plan::MealPlan::new(
                "user_b",
                "bulking",
                "none",
                serde_json::json!({}),
                now,
            ));

        let state = test_state_with(
            Arc::new(MockAccountRepository::default()),
            meal_plans,
            Arc::new(MockRazorpayService::new()),
            Arc::new(MockMealGenerator::new()),
        );

        let resp = list_plans(AxumState(state), AuthSession(test_claims("user_a"))).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let plans = json["plans"].as_array().unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0]["goal"], "weight loss");
    }
}
