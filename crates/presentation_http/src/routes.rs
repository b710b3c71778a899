//! Route definitions
//!
//! Layer order per surface, outermost first:
//! - `/v1`: throttle, required key gate
//! - `/admin/auth/login`: login-tier throttle, CSRF guard
//! - other `/admin` routes: throttle, CSRF guard, required session gate
//!
//! The throttle counts every request that reaches a surface, including ones
//! the gates behind it reject. `/health` sits outside all of them.

use application::ApplicationError;
use axum::{
    Router,
    http::{
        HeaderName, HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post},
};
use infrastructure::ServerConfig;
use tower_http::cors::{Any, CorsLayer};

use crate::{
    handlers,
    middleware::{
        ApiKeyAuthLayer, CsrfLayer, RequestContextLayer, SessionAuthLayer, ThrottleLayer,
        ThrottleMode,
    },
    state::AppState,
};

/// Build the CORS layer, or `None` when CORS is disabled
///
/// Without configured origins any origin is allowed; with origins, only
/// those are allowed and credentials (the session cookie) are permitted.
pub fn cors_layer(config: &ServerConfig) -> Option<CorsLayer> {
    if !config.cors_enabled {
        return None;
    }

    if config.allowed_origins.is_empty() {
        return Some(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
            .allow_headers([
                AUTHORIZATION,
                CONTENT_TYPE,
                HeaderName::from_static("x-requested-with"),
            ])
            .allow_credentials(true),
    )
}

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Result<Router, ApplicationError> {
    create_router_with(state, Router::new())
}

/// Create the main router, merging business routes under `/v1`
///
/// `business` routes sit behind the required API key gate; guard individual
/// routes with [`crate::middleware::RequireScopeLayer`].
pub fn create_router_with(
    state: AppState,
    business: Router<AppState>,
) -> Result<Router, ApplicationError> {
    let rate_config = std::sync::Arc::new(state.config.rate_limit.clone());
    let session_config = &state.config.session;
    let csrf = CsrfLayer::from_config(&state.config.csrf)?;

    let v1 = Router::new()
        .route("/me", get(handlers::me::whoami))
        .merge(business)
        .layer(ApiKeyAuthLayer::required(state.api_keys.clone()))
        .layer(ThrottleLayer::new(
            state.rate_limiter.clone(),
            rate_config.clone(),
            ThrottleMode::ByAuthClass,
        ));

    let login = Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .layer(csrf.clone())
        .layer(ThrottleLayer::new(
            state.rate_limiter.clone(),
            rate_config.clone(),
            ThrottleMode::Login,
        ));

    let admin = Router::new()
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/me", get(handlers::auth::me))
        .route(
            "/api-keys",
            get(handlers::api_keys::list_api_keys).post(handlers::api_keys::create_api_key),
        )
        .route(
            "/api-keys/{id}",
            get(handlers::api_keys::get_api_key)
                .patch(handlers::api_keys::update_api_key)
                .delete(handlers::api_keys::delete_api_key),
        )
        .route(
            "/api-keys/{id}/revoke",
            post(handlers::api_keys::revoke_api_key),
        )
        .route("/scopes", get(handlers::scopes::list_scopes))
        .layer(SessionAuthLayer::required(
            state.sessions.clone(),
            &session_config.cookie_name,
            session_config.secure_cookie,
        ))
        .layer(csrf)
        .layer(
            ThrottleLayer::new(
                state.rate_limiter.clone(),
                rate_config,
                ThrottleMode::ByAuthClass,
            )
            .with_session_cookie(&session_config.cookie_name),
        )
        .merge(login);

    Ok(Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/v1", v1)
        .nest("/admin", admin)
        .layer(RequestContextLayer::new())
        .with_state(state))
}
