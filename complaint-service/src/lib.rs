pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use service_core::axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::ServiceConfig;
use crate::middleware::auth::{ADMINS, ADMIN_ONLY, ANY_ROLE, SUPER_ADMIN_ONLY, USER_ONLY};
use crate::middleware::{require_roles, RoleGuard};
use crate::models::UserRole;
use crate::services::{
    AccessGate, AnalysisService, AuthService, ComplaintService, ComplaintStore, JwtService,
    Notifier, Summarizer, UserDirectory, UserService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: ServiceConfig,
    pub gate: AccessGate,
    pub auth: AuthService,
    pub users: UserService,
    pub complaints: ComplaintService,
    pub analysis: AnalysisService,
    pub directory: Arc<dyn UserDirectory>,
    pub login_rate_limiter: IpRateLimiter,
    pub password_reset_rate_limiter: IpRateLimiter,
}

impl AppState {
    /// Wires every service over the given collaborators. Without a
    /// summariser, analyses always use the local fallback.
    pub fn new(
        config: ServiceConfig,
        directory: Arc<dyn UserDirectory>,
        complaint_store: Arc<dyn ComplaintStore>,
        notifier: Arc<dyn Notifier>,
        summarizer: Option<Arc<dyn Summarizer>>,
    ) -> Self {
        let jwt = JwtService::new(&config.jwt);

        let gate = AccessGate::new(jwt.clone(), directory.clone());
        let auth = AuthService::new(
            directory.clone(),
            notifier.clone(),
            jwt,
            config.password,
            config.reset_pass_ui_link.clone(),
        );
        let users = UserService::new(directory.clone(), notifier.clone(), config.password);
        let complaints =
            ComplaintService::new(complaint_store.clone(), directory.clone(), notifier);
        let analysis = AnalysisService::new(complaint_store, summarizer);

        let login_rate_limiter = create_ip_rate_limiter(
            config.rate_limit.login_attempts,
            config.rate_limit.login_window_seconds,
        );
        let password_reset_rate_limiter = create_ip_rate_limiter(
            config.rate_limit.password_reset_attempts,
            config.rate_limit.password_reset_window_seconds,
        );

        Self {
            config,
            gate,
            auth,
            users,
            complaints,
            analysis,
            directory,
            login_rate_limiter,
            password_reset_rate_limiter,
        }
    }
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    let guard = |roles: &'static [UserRole]| {
        from_fn_with_state(RoleGuard::new(state.gate.clone(), roles), require_roles)
    };

    let auth_routes = Router::new()
        .route(
            "/login",
            post(handlers::auth::login).route_layer(from_fn_with_state(
                state.login_rate_limiter.clone(),
                ip_rate_limit_middleware,
            )),
        )
        .route(
            "/forget-password",
            post(handlers::auth::forget_password).route_layer(from_fn_with_state(
                state.password_reset_rate_limiter.clone(),
                ip_rate_limit_middleware,
            )),
        )
        .route(
            "/change-password",
            post(handlers::auth::change_password).route_layer(guard(ANY_ROLE)),
        )
        .route("/refresh-token", post(handlers::auth::refresh_token))
        .route("/reset-password", post(handlers::auth::reset_password));

    let user_routes = Router::new()
        .route("/signup", post(handlers::user::signup))
        .route(
            "/",
            get(handlers::user::list_users).route_layer(guard(SUPER_ADMIN_ONLY)),
        )
        .route(
            "/me",
            get(handlers::user::get_me)
                .patch(handlers::user::update_me)
                .route_layer(guard(ANY_ROLE)),
        )
        .route(
            "/:id",
            get(handlers::user::get_user)
                .patch(handlers::user::update_user)
                .delete(handlers::user::delete_user)
                .route_layer(guard(SUPER_ADMIN_ONLY)),
        );

    let complaint_routes = Router::new()
        .route("/public", get(handlers::complaint::list_public_complaints))
        .route(
            "/",
            post(handlers::complaint::create_complaint).route_layer(guard(USER_ONLY)),
        )
        .route(
            "/",
            get(handlers::complaint::list_complaints).route_layer(guard(ANY_ROLE)),
        )
        .route(
            "/:id/resolve",
            put(handlers::complaint::resolve_complaint).route_layer(guard(ADMINS)),
        )
        .route(
            "/:id/vote",
            post(handlers::complaint::vote_complaint).route_layer(guard(USER_ONLY)),
        )
        .route(
            "/:id/comment",
            post(handlers::complaint::comment_complaint).route_layer(guard(USER_ONLY)),
        )
        .route(
            "/dashboard/citizen",
            get(handlers::complaint::citizen_dashboard).route_layer(guard(USER_ONLY)),
        )
        .route(
            "/dashboard/admin",
            get(handlers::complaint::admin_dashboard).route_layer(guard(ADMIN_ONLY)),
        )
        .route(
            "/dashboard/super",
            get(handlers::complaint::super_admin_dashboard)
                .route_layer(guard(SUPER_ADMIN_ONLY)),
        );

    let ai_routes = Router::new()
        .route("/analyze-batch", post(handlers::ai::analyze_batch))
        .route("/analyze-location", post(handlers::ai::analyze_location))
        .route_layer(guard(ADMINS));

    let api = Router::new()
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .nest("/complaints", complaint_routes)
        .nest("/ai", ai_routes);

    let allowed_origins: Vec<HeaderValue> = state
        .config
        .security
        .allowed_origins
        .iter()
        .filter(|o| o.as_str() != "*")
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(origin = %o, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let app = Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api)
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(allowed_origins)
                .allow_credentials(true)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        );

    Ok(app)
}

/// Liveness plus a store ping.
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.directory.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Store health check failed");
        AppError::from(e)
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "mongodb": "up"
        }
    })))
}
