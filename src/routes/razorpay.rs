use axum::Json;
use axum::{extract::State, http::HeaderMap, response::IntoResponse};
use axum::{http::StatusCode, response::Response};
use serde_json::json;
use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::entitlement;
use crate::models::account::SubscriptionStatus;
use crate::responses::JsonResponse;
use crate::services::razorpay::{verify_webhook_signature, WebhookEvent};
use crate::state::AppState;

// POST /api/razorpay/webhook
//
// The provider signs the raw body; nothing is applied until that signature
// checks out. Deliveries for subscriptions we do not know are acknowledged
// rather than failed: the event may race ahead of checkout confirmation, and
// the provider retries on anything but a 2xx.
pub async fn webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    let signature = match headers
        .get("X-Razorpay-Signature")
        .and_then(|h| h.to_str().ok())
    {
        Some(s) => s,
        None => return JsonResponse::bad_request("Missing X-Razorpay-Signature").into_response(),
    };

    if !verify_webhook_signature(&body, signature, &app_state.config.razorpay.webhook_secret) {
        warn!("razorpay webhook signature verification failed");
        return (StatusCode::BAD_REQUEST, "invalid webhook").into_response();
    }

    let now = OffsetDateTime::now_utc();
    match WebhookEvent::parse(&body) {
        WebhookEvent::SubscriptionCancelled { subscription_id } => {
            match app_state.accounts.find_by_subscription_id(&subscription_id).await {
                Ok(Some(mut account)) => {
                    entitlement::downgrade_to_free(&mut account, now);
                    if let Err(err) = app_state.accounts.save(&account).await {
                        error!(?err, %subscription_id, "failed to persist webhook downgrade");
                    } else {
                        info!(external_id = %account.external_id, %subscription_id, "subscription cancelled by provider; account back on free tier");
                    }
                }
                Ok(None) => {
                    // Expected race: already downgraded, or never confirmed.
                    info!(%subscription_id, "cancellation for unknown subscription acknowledged");
                }
                Err(err) => {
                    error!(?err, %subscription_id, "failed to look up account for cancellation");
                }
            }
        }
        WebhookEvent::SubscriptionCharged { subscription_id }
        | WebhookEvent::SubscriptionUpdated { subscription_id } => {
            match app_state.accounts.find_by_subscription_id(&subscription_id).await {
                Ok(Some(mut account)) => {
                    if account.subscription_status != SubscriptionStatus::Active {
                        account.subscription_status = SubscriptionStatus::Active;
                        account.updated_at = now;
                        if let Err(err) = app_state.accounts.save(&account).await {
                            error!(?err, %subscription_id, "failed to persist subscription status");
                        }
                    }
                    info!(external_id = %account.external_id, %subscription_id, "subscription liveness confirmed");
                }
                Ok(None) => {
                    info!(%subscription_id, "charge for unknown subscription acknowledged");
                }
                Err(err) => {
                    error!(?err, %subscription_id, "failed to look up account for charge event");
                }
            }
        }
        WebhookEvent::Unrecognized => {
            info!("unhandled razorpay event acknowledged");
        }
    }

    Json(json!({ "received": true })).into_response()
}
