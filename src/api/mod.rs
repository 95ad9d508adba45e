//! API layer - HTTP handlers and routing
//!
//! This module contains:
//! - Authentication endpoints and the login page
//! - Server-rendered pages (alta, dashboards, baja and cambio de área forms)
//! - Collaborator, document and catalog JSON endpoints
//! - BI dashboard endpoints
//! - Admin endpoints for usuarios and catalogs
//! - Static file serving

pub mod admin;
pub mod analytics;
pub mod auth;
pub mod catalogos;
pub mod colaboradores;
pub mod documentos;
pub mod health;
pub mod middleware;
pub mod pages;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::config::ServerConfig;

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Build every route with its authentication and role guards
pub fn build_app_router(state: AppState) -> Router<AppState> {
    // Admin routes (need admin role)
    let admin_routes = Router::new()
        .merge(admin::router())
        .merge(catalogos::admin_router())
        .merge(documentos::admin_router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Coordinador or admin
    let editor_routes = Router::new()
        .merge(colaboradores::editor_router())
        .merge(documentos::editor_router())
        .route_layer(axum_middleware::from_fn(middleware::require_editor))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Any authenticated usuario
    let protected_routes = Router::new()
        .merge(auth::protected_router())
        .merge(colaboradores::router())
        .merge(documentos::router())
        .merge(analytics::router())
        .merge(catalogos::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // HTML pages redirect to the login page instead of answering 401
    let editor_pages = pages::editor_router()
        .route_layer(axum_middleware::from_fn(middleware::require_editor))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_page_auth,
        ));
    let pages = pages::router().route_layer(axum_middleware::from_fn_with_state(
        state,
        middleware::require_page_auth,
    ));

    // Public routes
    Router::new()
        .merge(health::router())
        .merge(auth::public_router())
        .merge(pages)
        .merge(editor_pages)
        .merge(protected_routes)
        .merge(editor_routes)
        .merge(admin_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, server: &ServerConfig) -> Router {
    let body_limit = state.upload_config.max_request_size as usize;

    Router::new()
        .merge(build_app_router(state.clone()))
        .nest_service("/static", ServeDir::new(&server.static_dir))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .layer(cors_layer(&server.cors_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for cookie authentication from the configured origin
fn cors_layer(origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE]);

    // Credentials cannot be combined with a wildcard origin
    if origin.trim() == "*" {
        return cors.allow_origin(Any);
    }
    match origin.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin).allow_credentials(true),
        Err(_) => {
            tracing::warn!("Invalid server.cors_origin '{}', cross-origin requests disabled", origin);
            cors
        }
    }
}
