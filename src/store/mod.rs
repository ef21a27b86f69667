use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Booking, BookingStatus, Event, SkillLevel, User, UserRole};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error")]
    Database(#[from] sqlx::Error),
}

/// Keyset cursor over a `(timestamp, id)` ordering. Encoded as
/// `<unix-millis>:<record-id>` in the `after` query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    pub ts: DateTime<Utc>,
    pub id: String,
}

impl PageCursor {
    pub fn new(ts: DateTime<Utc>, id: impl Into<String>) -> Self {
        Self { ts, id: id.into() }
    }

    pub fn encode(&self) -> String {
        format!("{}:{}", self.ts.timestamp_millis(), self.id)
    }

    pub fn decode(raw: &str) -> Option<Self> {
        let (millis, id) = raw.split_once(':')?;
        let millis: i64 = millis.parse().ok()?;
        let ts = DateTime::<Utc>::from_timestamp_millis(millis)?;
        if id.is_empty() {
            return None;
        }
        Some(Self::new(ts, id))
    }
}

#[derive(Debug, Clone)]
pub struct PageRequest {
    pub limit: i64,
    pub after: Option<PageCursor>,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: i64 = 10;
    pub const MAX_LIMIT: i64 = 100;

    pub fn new(limit: i64, after: Option<PageCursor>) -> Self {
        Self {
            limit: limit.clamp(1, Self::MAX_LIMIT),
            after,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LIMIT, None)
    }
}

/// One page of results. `next_cursor` is only present when `has_more`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Fetch `limit + 1` rows, hand them here: the extra row signals another
/// page without a second count query.
pub(crate) fn build_page<T>(
    mut items: Vec<T>,
    limit: i64,
    cursor_of: impl Fn(&T) -> PageCursor,
) -> Page<T> {
    let limit = limit as usize;
    let has_more = items.len() > limit;
    items.truncate(limit);
    let next_cursor = if has_more {
        items.last().map(|item| cursor_of(item).encode())
    } else {
        None
    };
    Page {
        items,
        has_more,
        next_cursor,
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub skill_level: Option<SkillLevel>,
    pub kind: Option<String>,
    pub tutor_id: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Admin-editable event fields. `None` leaves a field untouched; the
/// attendee count is deliberately not patchable through this path.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub location: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub skill_level: Option<SkillLevel>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub price: Option<Decimal>,
    pub max_attendees: Option<i32>,
    pub tutor_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCounts {
    pub total_events: i64,
    pub upcoming_events: i64,
    pub events_by_skill_level: HashMap<String, i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_users: i64,
    pub active_users: i64,
    pub users_by_role: HashMap<String, i64>,
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn create(&self, event: Event) -> Result<Event, StoreError>;
    async fn get(&self, id: &str) -> Result<Option<Event>, StoreError>;
    async fn list(&self, filter: &EventFilter, page: &PageRequest) -> Result<Page<Event>, StoreError>;
    async fn update(&self, id: &str, patch: &EventPatch) -> Result<Option<Event>, StoreError>;
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;
    async fn counts(&self, now: DateTime<Utc>) -> Result<EventCounts, StoreError>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Full-record write keyed by checkout-session id. A replayed write for
    /// an existing id overwrites the payload fields but keeps the original
    /// `created_at` and `counted`, so replays settle on identical content
    /// without disturbing attendance accounting.
    async fn put_confirmed(&self, booking: &Booking) -> Result<(), StoreError>;
    async fn get(&self, id: &str) -> Result<Option<Booking>, StoreError>;
    async fn list(&self, page: &PageRequest) -> Result<Page<Booking>, StoreError>;
    async fn list_for_user(
        &self,
        user_id: &str,
        status: Option<BookingStatus>,
        page: &PageRequest,
    ) -> Result<Page<Booking>, StoreError>;
    async fn set_status(&self, id: &str, status: BookingStatus) -> Result<Option<Booking>, StoreError>;
    async fn count(&self) -> Result<i64, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn upsert(&self, user: User) -> Result<User, StoreError>;
    async fn get(&self, id: &str) -> Result<Option<User>, StoreError>;
    async fn list(&self) -> Result<Vec<User>, StoreError>;
    async fn set_role(&self, id: &str, role: UserRole) -> Result<Option<User>, StoreError>;
    async fn stats(&self, now: DateTime<Utc>) -> Result<UserStats, StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Seat taken and the booking marked counted.
    Recorded,
    /// Booking already holds a seat; nothing changed.
    AlreadyCounted,
    /// Event at capacity; nothing changed.
    EventFull,
    BookingMissing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Seat returned and the counted flag cleared.
    Released,
    /// Booking held no seat; nothing changed.
    NotCounted,
    BookingMissing,
}

/// Seat accounting across the bookings and events records. Each operation
/// is atomic: the counted-flag flip and the counter adjustment either both
/// apply or neither does, and an increment never pushes an event past its
/// `max_attendees`.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn record(&self, booking_id: &str) -> Result<RecordOutcome, StoreError>;
    async fn release(&self, booking_id: &str) -> Result<ReleaseOutcome, StoreError>;
}
