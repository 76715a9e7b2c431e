mod config;
mod db;
mod entitlement;
mod models;
mod responses;
mod routes;
mod services;
mod session;
mod state;
mod utils;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::http::Method;
use axum::{
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use config::Config;
use db::postgres_account_repository::PostgresAccountRepository;
use db::postgres_meal_plan_repository::PostgresMealPlanRepository;
use db::{account_repository::AccountRepository, meal_plan_repository::MealPlanRepository};
use responses::JsonResponse;
use routes::billing::{
    cancel_subscription, confirm_subscription, create_subscription, subscription_status,
};
use routes::plans::{generate_plan, list_plans};
use routes::razorpay::webhook;
use services::generator::{LiveMealGenerator, MealGenerator};
use services::razorpay::{LiveRazorpayService, RazorpayService};
use state::AppState;
use utils::jwt::JwtKeys;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).unwrap();

    let rate_limit_ms: u64 = std::env::var("RATE_LIMITER_MILLISECONDS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        // Default: 200ms/token (~5 req/sec)
        .unwrap_or(200);
    let rate_limit_burst: u32 = std::env::var("RATE_LIMITER_BURST")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(20);
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(rate_limit_ms)
            .burst_size(rate_limit_burst)
            .use_headers()
            .error_handler(|_err| {
                JsonResponse::too_many_requests(
                    "Too many requests. Please wait a moment and try again.",
                )
                .into_response()
            })
            .finish()
            .unwrap(),
    );

    // Background task to cleanup old rate-limiter entries
    let governor_limiter = governor_conf.limiter().clone();
    std::thread::spawn(move || {
        let interval = std::time::Duration::from_secs(60);
        loop {
            std::thread::sleep(interval);
            governor_limiter.retain_recent();
        }
    });

    let config = Config::from_env();
    let jwt_keys = Arc::new(JwtKeys::from_env().expect("JWT secret must be usable"));

    let pg_pool = establish_connection(&config.database_url).await;
    let accounts = Arc::new(PostgresAccountRepository {
        pool: pg_pool.clone(),
    }) as Arc<dyn AccountRepository>;
    let meal_plans = Arc::new(PostgresMealPlanRepository {
        pool: pg_pool.clone(),
    }) as Arc<dyn MealPlanRepository>;

    let razorpay =
        Arc::new(LiveRazorpayService::from_settings(&config.razorpay)) as Arc<dyn RazorpayService>;
    let generator =
        Arc::new(LiveMealGenerator::from_settings(&config.generator)) as Arc<dyn MealGenerator>;

    let cors = CorsLayer::new()
        .allow_origin(config.frontend_origin.parse::<HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true);

    let state = AppState {
        accounts,
        meal_plans,
        razorpay,
        generator,
        config: Arc::new(config),
        jwt_keys,
    };

    let plan_routes = Router::new().route("/", post(generate_plan).get(list_plans));

    let billing_routes = Router::new()
        .route("/status", get(subscription_status))
        .route("/subscribe", post(create_subscription))
        .route("/confirm", post(confirm_subscription))
        .route("/cancel", post(cancel_subscription));

    let app = Router::new()
        .route("/", get(root))
        .nest("/api/plans", plan_routes)
        .nest("/api/billing", billing_routes)
        // Public provider callback; authenticated by its signature, not a session.
        .route("/api/razorpay/webhook", post(webhook))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(GovernorLayer {
            config: governor_conf.clone(),
        })
        .layer(cors);

    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));

    let listener = TcpListener::bind(addr).await.unwrap();
    info!("Listening on http://{}", addr);
    axum::serve(listener, make_service).await.unwrap();
}

/// A simple root route.
async fn root() -> Response {
    JsonResponse::success("Hello, Platewise!").into_response()
}

/// Establish a connection to the database and verify it.
async fn establish_connection(database_url: &str) -> PgPool {
    let pool = PgPool::connect(database_url)
        .await
        .expect("Failed to connect to the database");

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .expect("Failed to verify database connection");

    info!("Successfully connected to the database");
    pool
}
