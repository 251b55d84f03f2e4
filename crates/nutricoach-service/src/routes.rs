//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post, put};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    achievements, admin, ask, bot, challenges, health, labs, plan, profile, promo, referral,
    weight,
};
use crate::state::AppState;

// ============================================================================
// Concurrency Limiting Constants
// ============================================================================

/// Maximum concurrent requests to endpoints that call the language model.
const AI_MAX_CONCURRENT_REQUESTS: usize = 20;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Mini-App (`Authorization: tma <init data>`)
/// - `GET /v1/profile` - Subscription, credits, referral and progress summary
/// - `GET /v1/labs/credits` - Lab analysis allowance
/// - `POST /v1/labs/analyze` - Analyze lab results (free lab or one credit)
/// - `POST /v1/ask` - Ask a nutrition question (subscription required)
/// - `POST /v1/plan` - Generate a seven-day meal plan (subscription required)
/// - `POST /v1/recipes` - Suggest recipes from products (subscription required)
/// - `POST /v1/weight` - Record a weigh-in
/// - `GET /v1/weight?days=N` - Weigh-ins and change over the last N days
/// - `POST /v1/promo/redeem` - Redeem a promo code
/// - `GET /v1/referral` - Referral code and invite count
/// - `GET /v1/challenges` - Started and available challenges
/// - `POST /v1/challenges/:challenge_type/start` - Start a challenge
/// - `POST /v1/challenges/:challenge_type/log` - Log today's progress
/// - `GET /v1/achievements` - Earned badges
/// - `PUT /v1/admin/promocodes` - Create or replace a promo code (admin only)
///
/// ## Bot (`X-Api-Key`)
/// - `POST /v1/bot/start` - Register user, apply referral, grant trial
/// - `POST /v1/bot/promo` - Redeem a promo code
/// - `POST /v1/bot/payments` - Record a confirmed payment
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    // Model calls are slow and billed, so they get a tighter limit.
    let ai_routes = Router::new()
        .route("/labs/analyze", post(labs::analyze))
        .route("/ask", post(ask::ask))
        .route("/plan", post(plan::generate_plan))
        .route("/recipes", post(plan::generate_recipes))
        .layer(ConcurrencyLimitLayer::new(AI_MAX_CONCURRENT_REQUESTS));

    let bot_routes = Router::new()
        .route("/start", post(bot::start))
        .route("/promo", post(bot::redeem_promo))
        .route("/payments", post(bot::record_payment));

    let api_routes = Router::new()
        .route("/profile", get(profile::get_profile))
        .route("/labs/credits", get(labs::get_credits))
        .route("/promo/redeem", post(promo::redeem_promo))
        .route("/referral", get(referral::get_referral))
        .route("/challenges", get(challenges::list_challenges))
        .route(
            "/challenges/:challenge_type/start",
            post(challenges::start_challenge),
        )
        .route(
            "/challenges/:challenge_type/log",
            post(challenges::log_progress),
        )
        .route("/achievements", get(achievements::list_achievements))
        .route(
            "/weight",
            get(weight::get_history).post(weight::add_weight),
        )
        .route("/admin/promocodes", put(admin::upsert_promocode))
        .nest("/bot", bot_routes)
        .merge(ai_routes)
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        .nest("/v1", api_routes)
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
