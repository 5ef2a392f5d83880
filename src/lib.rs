// src/lib.rs
use anyhow::Result;
use app_state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use chrono::Duration as ChronoDuration;
use redis::Client;
use std::env;
use std::sync::Arc;

use rate_limit::{rate_limit, RateLimiter};

// Public exports (visible outside this module)
pub mod domain;

// Internal-only exports (sibling access within this module)
mod app_state;
mod config;
mod handlers;
mod infrastructure;
mod rate_limit;
mod session;
mod verification;

// Hoist up only the public symbol(s)
pub use session::{create_session, validate_session, AuthUser, SessionInfo};

pub use config::*;

pub use verification::{AttendancePolicy, MarkAttendanceRequest, VerificationService};

// Publicly expose the infrastructure creation functions
pub use infrastructure::{
    create_noop_metrics, // ---
    create_noop_selfie_verifier,
    create_pg_pool,
    create_postgres_stores,
    create_prom_metrics,
    create_qr_token_issuer,
    create_reference_selfie_verifier,
    init_database,
    init_database_with_retry_from_env,
};

/// Build the HTTP router with metrics implementation determined by environment variables.
pub fn create_router() -> Result<Router> {
    // ---
    // Load all configuration from environment
    let config = AppConfig::from_env()?;

    // Determine metrics implementation from environment
    let metrics_type = env::var("ATTEND_METRICS_TYPE").unwrap_or_else(|_| "noop".to_string());
    let metrics = if metrics_type == "prom" {
        create_prom_metrics()?
    } else {
        create_noop_metrics()?
    };

    tracing_subscriber::fmt::try_init().ok(); // Ignores if already initialized

    // Create infrastructure dependencies. The pool connects lazily; the
    // binary runs schema init before serving.
    let redis_client = Client::open(config.redis.url.clone())?;
    let pool = create_pg_pool(&config.database)?;
    let (identity, devices, ledger) = create_postgres_stores(pool);

    let qr = create_qr_token_issuer(&config.auth.token_secret, config.attendance.qr_ttl);
    let selfie = if config.attendance.selfie_required {
        create_reference_selfie_verifier()
    } else {
        create_noop_selfie_verifier()
    };

    let verification = Arc::new(VerificationService::new(
        identity.clone(),
        devices.clone(),
        ledger.clone(),
        qr.clone(),
        selfie,
        AttendancePolicy {
            selfie_required: config.attendance.selfie_required,
            grace: ChronoDuration::seconds(config.attendance.grace.as_secs() as i64),
        },
    ));

    // Build application state with all dependencies
    let app_state = AppState::new(
        redis_client,
        metrics,
        identity,
        devices,
        ledger,
        qr,
        verification,
        config.redis.session_ttl,
    );

    // Registration and login get a strict limiter; everything shares the
    // general one.
    let auth_limiter = Arc::new(RateLimiter::new(
        config.rate_limit.auth_max_requests,
        config.rate_limit.window,
        config.rate_limit.max_tracked_clients,
    ));
    let api_limiter = Arc::new(RateLimiter::new(
        config.rate_limit.api_max_requests,
        config.rate_limit.window,
        config.rate_limit.max_tracked_clients,
    ));

    let router = Router::new()
        .route("/", get(handlers::root_handler))
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .nest(
            "/auth",
            Router::new()
                .route("/register", post(handlers::register))
                .route("/login", post(handlers::login))
                .route_layer(middleware::from_fn_with_state(auth_limiter, rate_limit))
                .route("/profile", get(handlers::profile)),
        )
        .nest(
            "/attendance",
            Router::new()
                .route("/mark", post(handlers::mark_attendance))
                .route("/qr", post(handlers::issue_qr_token))
                .route("/today", get(handlers::today_attendance))
                .route("/user/{userId}", get(handlers::user_attendance_history))
                .route("/", get(handlers::list_attendance))
                .route(
                    "/{id}",
                    get(handlers::get_attendance)
                        .put(handlers::update_attendance)
                        .delete(handlers::delete_attendance),
                ),
        )
        .nest(
            "/users",
            Router::new()
                .route("/", get(handlers::list_users))
                .route(
                    "/{id}",
                    get(handlers::get_user)
                        .put(handlers::update_user)
                        .delete(handlers::delete_user),
                ),
        )
        .nest(
            "/devices",
            Router::new().route("/register", post(handlers::register_device)),
        )
        .layer(middleware::from_fn_with_state(api_limiter, rate_limit))
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            handlers::track_http_metrics,
        ))
        .with_state(app_state);

    Ok(router)
}
