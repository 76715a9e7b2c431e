use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum RazorpayError {
    #[error("razorpay api error: {0}")]
    Api(String),
    #[error("unexpected razorpay response: {0}")]
    Serde(String),
}

/// Subscription handle as returned by subscription creation. `short_url` is
/// the hosted checkout link the frontend sends the user to.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderSubscription {
    pub id: String,
    pub status: String,
    pub short_url: Option<String>,
}

/// Outbound surface of the payment provider. Webhook authentication is not on
/// the trait: it is a pure keyed-hash check that never differs between
/// deployments, see [`verify_webhook_signature`].
#[async_trait]
pub trait RazorpayService: Send + Sync {
    async fn create_subscription(
        &self,
        plan_id: &str,
    ) -> Result<ProviderSubscription, RazorpayError>;

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), RazorpayError>;
}

fn matches_hex_digest(mac: HmacSha256, provided: &str) -> bool {
    let expected = hex::encode(mac.finalize().into_bytes());
    // Full-width comparison; no early exit on the first differing byte.
    expected.as_bytes().ct_eq(provided.as_bytes()).unwrap_u8() == 1
}

/// Authenticate a webhook delivery: HMAC-SHA256 over the exact raw body,
/// hex-encoded, compared against the `X-Razorpay-Signature` header value.
/// An empty or malformed header simply fails the comparison.
pub fn verify_webhook_signature(raw_body: &[u8], signature_header: &str, secret: &str) -> bool {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(raw_body);
    matches_hex_digest(mac, signature_header)
}

/// Authenticate a checkout success callback. The provider signs
/// `"{payment_id}|{subscription_id}"` with the API key secret.
pub fn verify_checkout_signature(
    payment_id: &str,
    subscription_id: &str,
    signature: &str,
    key_secret: &str,
) -> bool {
    let mut mac =
        HmacSha256::new_from_slice(key_secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(payment_id.as_bytes());
    mac.update(b"|");
    mac.update(subscription_id.as_bytes());
    matches_hex_digest(mac, signature)
}

/// The closed set of webhook events this application reacts to. Anything
/// else, including a recognized event name without a subscription id, parses
/// to `Unrecognized` and is acknowledged without effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    SubscriptionCancelled { subscription_id: String },
    SubscriptionCharged { subscription_id: String },
    SubscriptionUpdated { subscription_id: String },
    Unrecognized,
}

#[derive(Deserialize)]
struct WebhookEnvelope {
    event: Option<String>,
    payload: Option<WebhookPayload>,
}

#[derive(Deserialize)]
struct WebhookPayload {
    subscription: Option<SubscriptionWrapper>,
}

#[derive(Deserialize)]
struct SubscriptionWrapper {
    entity: Option<SubscriptionEntity>,
}

#[derive(Deserialize)]
struct SubscriptionEntity {
    id: Option<String>,
}

impl WebhookEvent {
    pub fn parse(raw_body: &[u8]) -> Self {
        let envelope: WebhookEnvelope = match serde_json::from_slice(raw_body) {
            Ok(env) => env,
            Err(_) => return WebhookEvent::Unrecognized,
        };
        let subscription_id = envelope
            .payload
            .and_then(|p| p.subscription)
            .and_then(|s| s.entity)
            .and_then(|e| e.id);

        match (envelope.event.as_deref(), subscription_id) {
            (Some("subscription.cancelled"), Some(id)) => WebhookEvent::SubscriptionCancelled {
                subscription_id: id,
            },
            (Some("subscription.charged"), Some(id)) => WebhookEvent::SubscriptionCharged {
                subscription_id: id,
            },
            (Some("subscription.updated"), Some(id)) => WebhookEvent::SubscriptionUpdated {
                subscription_id: id,
            },
            _ => WebhookEvent::Unrecognized,
        }
    }
}

mod live;
mod mock;

#[allow(unused_imports)]
pub use live::LiveRazorpayService;
#[allow(unused_imports)]
pub use mock::MockRazorpayService;
