use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use domain::services::VisitRecorder;
use persistence::repositories::VisitRepository;
use shared::jwt::{JwtConfig, JwtError};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{
    metrics_handler, metrics_middleware, optional_user_auth, rate_limit_middleware,
    require_user_auth, security_headers_middleware, trace_id, RateLimiterState,
};
use crate::routes::{auth, families, health, restaurants, users, visits};
use crate::services::EmailService;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub jwt: Arc<JwtConfig>,
    pub email: EmailService,
    pub rate_limiter: Option<Arc<RateLimiterState>>,
    pub visit_recorder: Arc<VisitRecorder<VisitRepository>>,
}

impl AppState {
    /// Fails when the configured JWT keys cannot be parsed.
    pub fn new(config: Config, pool: PgPool) -> Result<Self, JwtError> {
        let (private_key, public_key) = config.jwt.normalized_keys();
        let jwt = JwtConfig::with_leeway(
            &private_key,
            &public_key,
            config.jwt.access_token_expiry_secs,
            config.jwt.refresh_token_expiry_secs,
            config.jwt.leeway_secs,
        )?;

        let visit_recorder = VisitRecorder::new(
            Arc::new(VisitRepository::new(pool.clone())),
            (&config.limits).into(),
        );

        Ok(Self {
            email: EmailService::new(config.email.clone(), &config.server.app_base_url),
            rate_limiter: RateLimiterState::new(config.security.rate_limit_per_minute)
                .map(Arc::new),
            jwt: Arc::new(jwt),
            visit_recorder: Arc::new(visit_recorder),
            config: Arc::new(config),
            pool,
        })
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        // Development: any origin.
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn create_app(config: Config, pool: PgPool) -> Result<Router, JwtError> {
    Ok(build_router(AppState::new(config, pool)?))
}

pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();

    // Rate limiting runs after auth; it keys on the authenticated user.
    let protected_routes = Router::new()
        .route("/api/v1/users/me", get(users::get_me).put(users::update_me))
        .route("/api/v1/families", post(families::create_family))
        .route("/api/v1/families/join", post(families::join_family))
        .route(
            "/api/v1/families/me",
            get(families::get_my_family)
                .put(families::update_my_family)
                .delete(families::delete_my_family),
        )
        .route(
            "/api/v1/families/me/invite-code",
            post(families::regenerate_invite_code),
        )
        .route("/api/v1/families/me/leave", post(families::leave_family))
        .route(
            "/api/v1/families/me/members/:user_id",
            axum::routing::delete(families::remove_member),
        )
        .route(
            "/api/v1/families/me/members/:user_id/role",
            put(families::change_member_role),
        )
        .route(
            "/api/v1/families/me/transfer-ownership",
            post(families::transfer_ownership),
        )
        .route(
            "/api/v1/restaurants",
            get(restaurants::list_restaurants).post(restaurants::create_restaurant),
        )
        .route(
            "/api/v1/restaurants/:restaurant_id",
            get(restaurants::get_restaurant)
                .put(restaurants::update_restaurant)
                .delete(restaurants::delete_restaurant),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_user_auth,
        ));

    // The visit recorder answers unauthenticated writes itself; reads and
    // deletes reject through the UserAuth extractor.
    let visit_routes = Router::new()
        .route(
            "/api/v1/restaurants/:restaurant_id/visits",
            get(visits::list_visits).post(visits::create_visit),
        )
        .route(
            "/api/v1/restaurants/:restaurant_id/visits/:visit_id",
            put(visits::update_visit).delete(visits::delete_visit),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            optional_user_auth,
        ));

    let auth_routes = Router::new()
        .route("/api/v1/auth/register", post(auth::register))
        .route("/api/v1/auth/login", post(auth::login))
        .route("/api/v1/auth/refresh", post(auth::refresh))
        .route("/api/v1/auth/logout", post(auth::logout))
        .route("/api/v1/auth/forgot-password", post(auth::forgot_password))
        .route("/api/v1/auth/reset-password", post(auth::reset_password))
        .route("/api/v1/auth/verify-email", post(auth::verify_email));

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(auth_routes)
        .merge(protected_routes)
        .merge(visit_routes)
        // Bottom layers run first.
        .layer(middleware::from_fn_with_state(
            config.security.hsts_enabled,
            security_headers_middleware,
        ))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors_layer(&config.security.cors_origins))
        .with_state(state)
}
