use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::utils::response::success;

pub mod admin;
pub mod bookings;
pub mod checkout;
pub mod events;
pub mod users;
pub mod webhook;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "stitch-api",
    };

    success(payload, "Health check successful").into_response()
}
