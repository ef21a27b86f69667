use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::models::{Event, SkillLevel};
use crate::state::AppState;
use crate::store::{EventFilter, EventPatch, EventStore, PageCursor, PageRequest};
use crate::utils::error::AppError;
use crate::utils::response::{empty_success, success};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub date: DateTime<Utc>,
    pub location: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub skill_level: SkillLevel,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub max_attendees: i32,
    pub tutor_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEventsQuery {
    pub skill_level: Option<SkillLevel>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub tutor_id: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub after: Option<String>,
}

pub(super) fn page_request(
    limit: Option<i64>,
    after: Option<&str>,
) -> Result<PageRequest, AppError> {
    let after = after
        .map(|raw| {
            PageCursor::decode(raw)
                .ok_or_else(|| AppError::ValidationError("Invalid pagination cursor".to_string()))
        })
        .transpose()?;
    Ok(PageRequest::new(
        limit.unwrap_or(PageRequest::DEFAULT_LIMIT),
        after,
    ))
}

/// POST /api/events — admin creation; new events always start empty.
pub async fn create_event(
    State(state): State<AppState>,
    Json(request): Json<CreateEventRequest>,
) -> Result<Response, AppError> {
    if request.title.trim().is_empty() {
        return Err(AppError::ValidationError("title is required".to_string()));
    }
    if request.price.is_sign_negative() {
        return Err(AppError::ValidationError(
            "price must be non-negative".to_string(),
        ));
    }
    if request.max_attendees <= 0 {
        return Err(AppError::ValidationError(
            "maxAttendees must be positive".to_string(),
        ));
    }

    let now = Utc::now();
    let event = Event {
        id: Uuid::new_v4().to_string(),
        title: request.title,
        description: request.description,
        date: request.date,
        location: request.location,
        kind: request.kind,
        skill_level: request.skill_level,
        price: request.price,
        current_attendees: 0,
        max_attendees: request.max_attendees,
        tutor_id: request.tutor_id,
        created_at: now,
        updated_at: now,
    };

    let event = state.events.create(event).await?;
    Ok(success(event, "Event created").into_response())
}

/// GET /api/events — filtered, date-ordered, keyset-paginated.
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<ListEventsQuery>,
) -> Result<Response, AppError> {
    let page = page_request(query.limit, query.after.as_deref())?;
    let filter = EventFilter {
        skill_level: query.skill_level,
        kind: query.kind,
        tutor_id: query.tutor_id,
        start_date: query.start_date,
        end_date: query.end_date,
    };

    let events = state.events.list(&filter, &page).await?;
    Ok(success(events, "Events fetched").into_response())
}

/// GET /api/events/:id
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let event = state
        .events
        .get(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event '{id}' was not found")))?;
    Ok(success(event, "Event fetched").into_response())
}

/// PATCH /api/events/:id
pub async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<EventPatch>,
) -> Result<Response, AppError> {
    if let Some(price) = patch.price {
        if price.is_sign_negative() {
            return Err(AppError::ValidationError(
                "price must be non-negative".to_string(),
            ));
        }
    }
    if let Some(max) = patch.max_attendees {
        if max <= 0 {
            return Err(AppError::ValidationError(
                "maxAttendees must be positive".to_string(),
            ));
        }
    }

    let event = state
        .events
        .update(&id, &patch)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event '{id}' was not found")))?;
    Ok(success(event, "Event updated").into_response())
}

/// DELETE /api/events/:id
pub async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    if !state.events.delete(&id).await? {
        return Err(AppError::NotFound(format!("Event '{id}' was not found")));
    }
    Ok(empty_success("Event deleted").into_response())
}
