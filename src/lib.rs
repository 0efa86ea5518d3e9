pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;
pub mod state;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use state::AppState;

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/slots", get(handlers::slots::get_slots))
        .route("/api/holds", post(handlers::holds::create_hold))
        .route("/api/holds/:id", delete(handlers::holds::release_hold))
        .route("/api/checkout", post(handlers::checkout::checkout))
        .route(
            "/api/checkout/:booking_id/abandon",
            post(handlers::checkout::abandon),
        )
        .route("/api/bookings/:id", get(handlers::checkout::get_booking))
        .route("/webhook/payments", post(handlers::webhook::payment_webhook))
        .route(
            "/api/admin/bookings",
            get(handlers::admin::get_bookings).post(handlers::admin::force_book),
        )
        .route(
            "/api/admin/bookings/:id/cancel",
            post(handlers::admin::cancel_booking),
        )
        .route(
            "/api/admin/bookings/:id/reschedule",
            post(handlers::admin::reschedule_booking),
        )
        .route(
            "/api/admin/bookings/:id/complete",
            post(handlers::admin::complete_booking),
        )
        .route(
            "/api/admin/bookings/:id/approve",
            post(handlers::admin::approve_booking),
        )
        .route("/api/admin/windows", post(handlers::admin::create_window))
        .route("/api/admin/overrides", post(handlers::admin::put_override))
        .route("/api/admin/blackouts", post(handlers::admin::create_blackout))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
