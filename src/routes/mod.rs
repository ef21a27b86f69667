use axum::{
    routing::{get, patch, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{admin, bookings, checkout, events, health_check, users, webhook};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/checkout-session", post(checkout::create_checkout_session))
        .route("/api/webhook", post(webhook::handle_webhook))
        .route("/api/payments/config", get(checkout::payment_config))
        .route("/api/events", post(events::create_event).get(events::list_events))
        .route(
            "/api/events/:id",
            get(events::get_event)
                .patch(events::update_event)
                .delete(events::delete_event),
        )
        .route("/api/bookings", get(bookings::list_bookings))
        .route("/api/bookings/:id/status", patch(bookings::update_booking_status))
        .route("/api/users", get(users::list_users))
        .route("/api/users/:id", put(users::upsert_user).get(users::get_user))
        .route("/api/users/:id/role", patch(users::update_user_role))
        .route("/api/users/:id/bookings", get(bookings::list_user_bookings))
        .route("/api/admin/analytics", get(admin::analytics))
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer())
        .layer(create_cors_layer())
        .with_state(state)
}
