//! Route definitions for the print supplies inventory API

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Everything else requires a session token
        .merge(protected_routes(state))
}

fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/reports", get(handlers::generate_report))
        .route("/analytics", get(handlers::analytics))
        .route("/search", get(handlers::search))
        .route("/export", get(handlers::export))
        .route(
            "/notifications",
            get(handlers::notifications).post(handlers::notifications),
        )
        .nest("/backups", backup_routes())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Backup routes (admin only, checked in the handlers)
fn backup_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_backups).post(handlers::create_backup))
        .route("/cleanup", post(handlers::cleanup_backups))
        .route("/:id", delete(handlers::delete_backup))
}
