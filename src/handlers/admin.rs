use std::collections::HashMap;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;
use crate::store::{BookingStore, EventStore, UserStats, UserStore};
use crate::utils::error::AppError;
use crate::utils::response::success;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EventAnalytics {
    total_events: i64,
    upcoming_events: i64,
    total_bookings: i64,
    popular_skill_levels: HashMap<String, i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyticsReport {
    events: EventAnalytics,
    users: UserStats,
}

/// GET /api/admin/analytics — the dashboard numbers: event and booking
/// totals plus user activity, computed from the stores on request.
pub async fn analytics(State(state): State<AppState>) -> Result<Response, AppError> {
    let now = Utc::now();

    let event_counts = state.events.counts(now).await?;
    let total_bookings = state.bookings.count().await?;
    let users = state.users.stats(now).await?;

    let report = AnalyticsReport {
        events: EventAnalytics {
            total_events: event_counts.total_events,
            upcoming_events: event_counts.upcoming_events,
            total_bookings,
            popular_skill_levels: event_counts.events_by_skill_level,
        },
        users,
    };

    Ok(success(report, "Analytics fetched").into_response())
}
