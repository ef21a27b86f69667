use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::handlers::events::page_request;
use crate::models::BookingStatus;
use crate::state::AppState;
use crate::store::BookingStore;
use crate::utils::error::AppError;
use crate::utils::response::success;

#[derive(Debug, Deserialize)]
pub struct ListBookingsQuery {
    pub limit: Option<i64>,
    pub after: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserBookingsQuery {
    pub status: Option<BookingStatus>,
    pub limit: Option<i64>,
    pub after: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: BookingStatus,
}

/// GET /api/bookings — admin view, newest first.
pub async fn list_bookings(
    State(state): State<AppState>,
    Query(query): Query<ListBookingsQuery>,
) -> Result<Response, AppError> {
    let page = page_request(query.limit, query.after.as_deref())?;
    let bookings = state.bookings.list(&page).await?;
    Ok(success(bookings, "Bookings fetched").into_response())
}

/// GET /api/users/:id/bookings
pub async fn list_user_bookings(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<UserBookingsQuery>,
) -> Result<Response, AppError> {
    let page = page_request(query.limit, query.after.as_deref())?;
    let bookings = state
        .bookings
        .list_for_user(&user_id, query.status, &page)
        .await?;
    Ok(success(bookings, "Bookings fetched").into_response())
}

/// PATCH /api/bookings/:id/status — admin approval and cancellation, with
/// the seat moving alongside the status.
pub async fn update_booking_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Response, AppError> {
    let booking = state.manager.transition(&id, request.status).await?;
    Ok(success(booking, "Booking status updated").into_response())
}
