use axum::{extract::State, http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::entitlement;
use crate::responses::JsonResponse;
use crate::services::razorpay::verify_checkout_signature;
use crate::session::AuthSession;
use crate::state::AppState;

/// GET /api/billing/status
///
/// Read-only projection of the entitlement state. The lazy monthly reset may
/// fire here, in which case the refreshed record is written back.
pub async fn subscription_status(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
) -> Response {
    let now = OffsetDateTime::now_utc();
    let mut account = match app_state.resolve_account(&claims.sub, now).await {
        Ok(account) => account,
        Err(err) => {
            error!(?err, external_id = %claims.sub, "failed to load account for status");
            return JsonResponse::server_error("Could not load your account").into_response();
        }
    };

    let before = account.clone();
    let snapshot = entitlement::status_snapshot(&mut account, now);
    if account != before {
        if let Err(err) = app_state.accounts.save(&account).await {
            // The projection itself is still valid; the next access retries.
            warn!(?err, external_id = %claims.sub, "failed to persist lazy token reset");
        }
    }

    (StatusCode::OK, Json(json!({ "success": true, "status": snapshot }))).into_response()
}

#[derive(Debug, Deserialize)]
pub struct SubscribePayload {
    pub plan_id: String,
}

/// POST /api/billing/subscribe
///
/// Creates the provider subscription for a known plan and hands the checkout
/// reference back to the client. The account is not touched here: the tier
/// only changes once payment success is confirmed.
pub async fn create_subscription(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Json(payload): Json<SubscribePayload>,
) -> Response {
    if !app_state.config.razorpay.is_known_plan(&payload.plan_id) {
        warn!(external_id = %claims.sub, plan_id = %payload.plan_id, "subscription requested for unknown plan");
        return JsonResponse::bad_request_with_code("Unknown subscription plan", "unknown-plan")
            .into_response();
    }

    match app_state.razorpay.create_subscription(&payload.plan_id).await {
        Ok(subscription) => {
            info!(external_id = %claims.sub, subscription_id = %subscription.id, "created provider subscription");
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "subscription_id": subscription.id,
                    "short_url": subscription.short_url,
                    "key_id": app_state.config.razorpay.key_id,
                })),
            )
                .into_response()
        }
        Err(err) => {
            error!(?err, external_id = %claims.sub, plan_id = %payload.plan_id, "provider subscription creation failed");
            JsonResponse::bad_gateway("Could not start the subscription, please try again")
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ConfirmPayload {
    pub razorpay_subscription_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

/// POST /api/billing/confirm
///
/// Checkout success callback: the provider signs `payment_id|subscription_id`
/// with the API key secret. A valid signature is the payment-success proof
/// that promotes the account to Pro.
pub async fn confirm_subscription(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Json(payload): Json<ConfirmPayload>,
) -> Response {
    let verified = verify_checkout_signature(
        &payload.razorpay_payment_id,
        &payload.razorpay_subscription_id,
        &payload.razorpay_signature,
        &app_state.config.razorpay.key_secret,
    );
    if !verified {
        warn!(external_id = %claims.sub, subscription_id = %payload.razorpay_subscription_id, "checkout confirmation with invalid signature");
        return JsonResponse::bad_request_with_code("Invalid payment signature", "invalid-signature")
            .into_response();
    }

    let now = OffsetDateTime::now_utc();
    let mut account = match app_state.resolve_account(&claims.sub, now).await {
        Ok(account) => account,
        Err(err) => {
            error!(?err, external_id = %claims.sub, "failed to load account for upgrade");
            return JsonResponse::server_error("Could not load your account").into_response();
        }
    };

    entitlement::upgrade_to_pro(&mut account, &payload.razorpay_subscription_id, now);
    if let Err(err) = app_state.accounts.save(&account).await {
        error!(?err, external_id = %claims.sub, "failed to persist upgrade");
        return JsonResponse::server_error("Could not activate your subscription").into_response();
    }

    info!(external_id = %claims.sub, subscription_id = %payload.razorpay_subscription_id, "account upgraded to pro");
    let snapshot = entitlement::status_snapshot(&mut account, now);
    (StatusCode::OK, Json(json!({ "success": true, "status": snapshot }))).into_response()
}

/// POST /api/billing/cancel
///
/// Cancels with the provider first; only a confirmed cancellation downgrades
/// the account. A provider failure leaves the record untouched.
pub async fn cancel_subscription(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
) -> Response {
    let now = OffsetDateTime::now_utc();
    let mut account = match app_state.resolve_account(&claims.sub, now).await {
        Ok(account) => account,
        Err(err) => {
            error!(?err, external_id = %claims.sub, "failed to load account for cancellation");
            return JsonResponse::server_error("Could not load your account").into_response();
        }
    };

    let subscription_id = match account.subscription_id.clone() {
        Some(id) => id,
        None => {
            return JsonResponse::bad_request_with_code(
                "No active subscription to cancel",
                "no-active-subscription",
            )
            .into_response();
        }
    };

    if let Err(err) = app_state.razorpay.cancel_subscription(&subscription_id).await {
        error!(?err, external_id = %claims.sub, %subscription_id, "provider cancellation failed");
        return JsonResponse::bad_gateway("Could not cancel the subscription, please try again")
            .into_response();
    }

    entitlement::downgrade_to_free(&mut account, now);
    if let Err(err) = app_state.accounts.save(&account).await {
        error!(?err, external_id = %claims.sub, "failed to persist downgrade after cancellation");
        return JsonResponse::server_error("Cancellation was accepted but could not be saved")
            .into_response();
    }

    info!(external_id = %claims.sub, %subscription_id, "subscription cancelled; account back on free tier");
    JsonResponse::success("Subscription cancelled").into_response()
}
