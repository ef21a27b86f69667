use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use crate::models::{Booking, BookingStatus, Event, User, UserRole};
use crate::store::{
    build_page, AttendanceStore, BookingStore, EventCounts, EventFilter, EventPatch, EventStore,
    Page, PageCursor, PageRequest, RecordOutcome, ReleaseOutcome, StoreError, UserStats, UserStore,
};

const EVENT_COLUMNS: &str = "id, title, description, date, location, kind, skill_level, price, \
     current_attendees, max_attendees, tutor_id, created_at, updated_at";

const BOOKING_COLUMNS: &str =
    "id, event_id, user_id, status, payment_id, amount, counted, created_at, updated_at";

const USER_COLUMNS: &str =
    "id, email, display_name, role, skill_level, photo_url, created_at, last_login_at";

const ACTIVE_USER_WINDOW_DAYS: i64 = 30;

/// Postgres-backed store. One handle implements every store trait so the
/// attendance operations can span the bookings and events tables in a
/// single transaction.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventStore for PgStore {
    async fn create(&self, event: Event) -> Result<Event, StoreError> {
        sqlx::query(
            "INSERT INTO events \
                 (id, title, description, date, location, kind, skill_level, price, \
                  current_attendees, max_attendees, tutor_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(&event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.date)
        .bind(&event.location)
        .bind(&event.kind)
        .bind(event.skill_level)
        .bind(event.price)
        .bind(event.current_attendees)
        .bind(event.max_attendees)
        .bind(&event.tutor_id)
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(event)
    }

    async fn get(&self, id: &str) -> Result<Option<Event>, StoreError> {
        let event = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(event)
    }

    async fn list(&self, filter: &EventFilter, page: &PageRequest) -> Result<Page<Event>, StoreError> {
        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE ($1::text IS NULL OR skill_level = $1) \
               AND ($2::text IS NULL OR kind = $2) \
               AND ($3::text IS NULL OR tutor_id = $3) \
               AND ($4::timestamptz IS NULL OR date >= $4) \
               AND ($5::timestamptz IS NULL OR date <= $5) \
               AND ($6::timestamptz IS NULL OR (date, id) > ($6, $7::text)) \
             ORDER BY date ASC, id ASC \
             LIMIT $8"
        ))
        .bind(filter.skill_level.map(|s| s.as_str()))
        .bind(&filter.kind)
        .bind(&filter.tutor_id)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(page.after.as_ref().map(|c| c.ts))
        .bind(page.after.as_ref().map(|c| c.id.as_str()))
        .bind(page.limit + 1)
        .fetch_all(&self.pool)
        .await?;

        Ok(build_page(events, page.limit, |e| {
            PageCursor::new(e.date, e.id.clone())
        }))
    }

    async fn update(&self, id: &str, patch: &EventPatch) -> Result<Option<Event>, StoreError> {
        // max_attendees never drops below the seats already taken.
        let event = sqlx::query_as::<_, Event>(&format!(
            "UPDATE events SET \
                 title = COALESCE($2, title), \
                 description = COALESCE($3, description), \
                 date = COALESCE($4, date), \
                 location = COALESCE($5, location), \
                 kind = COALESCE($6, kind), \
                 skill_level = COALESCE($7, skill_level), \
                 price = COALESCE($8, price), \
                 max_attendees = GREATEST(COALESCE($9, max_attendees), current_attendees), \
                 tutor_id = COALESCE($10, tutor_id), \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING {EVENT_COLUMNS}"
        ))
        .bind(id)
        .bind(&patch.title)
        .bind(&patch.description)
        .bind(patch.date)
        .bind(&patch.location)
        .bind(&patch.kind)
        .bind(patch.skill_level.map(|s| s.as_str()))
        .bind(patch.price)
        .bind(patch.max_attendees)
        .bind(&patch.tutor_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(event)
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn counts(&self, now: DateTime<Utc>) -> Result<EventCounts, StoreError> {
        let total_events: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events")
            .fetch_one(&self.pool)
            .await?;

        let upcoming_events: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events WHERE date > $1")
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT skill_level, COUNT(*) FROM events GROUP BY skill_level")
                .fetch_all(&self.pool)
                .await?;

        Ok(EventCounts {
            total_events,
            upcoming_events,
            events_by_skill_level: rows.into_iter().collect::<HashMap<_, _>>(),
        })
    }
}

#[async_trait]
impl BookingStore for PgStore {
    async fn put_confirmed(&self, booking: &Booking) -> Result<(), StoreError> {
        // Keyed full-record set: replays overwrite the payload but keep the
        // original created_at and counted flag.
        sqlx::query(
            "INSERT INTO bookings \
                 (id, event_id, user_id, status, payment_id, amount, counted, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (id) DO UPDATE SET \
                 event_id = EXCLUDED.event_id, \
                 user_id = EXCLUDED.user_id, \
                 status = EXCLUDED.status, \
                 payment_id = EXCLUDED.payment_id, \
                 amount = EXCLUDED.amount, \
                 updated_at = EXCLUDED.updated_at",
        )
        .bind(&booking.id)
        .bind(&booking.event_id)
        .bind(&booking.user_id)
        .bind(booking.status)
        .bind(&booking.payment_id)
        .bind(booking.amount)
        .bind(booking.counted)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Booking>, StoreError> {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(booking)
    }

    async fn list(&self, page: &PageRequest) -> Result<Page<Booking>, StoreError> {
        let bookings = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE ($1::timestamptz IS NULL OR (created_at, id) < ($1, $2::text)) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $3"
        ))
        .bind(page.after.as_ref().map(|c| c.ts))
        .bind(page.after.as_ref().map(|c| c.id.as_str()))
        .bind(page.limit + 1)
        .fetch_all(&self.pool)
        .await?;

        Ok(build_page(bookings, page.limit, |b| {
            PageCursor::new(b.created_at, b.id.clone())
        }))
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        status: Option<BookingStatus>,
        page: &PageRequest,
    ) -> Result<Page<Booking>, StoreError> {
        let bookings = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE user_id = $1 \
               AND ($2::text IS NULL OR status = $2) \
               AND ($3::timestamptz IS NULL OR (created_at, id) < ($3, $4::text)) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $5"
        ))
        .bind(user_id)
        .bind(status.map(|s| s.as_str()))
        .bind(page.after.as_ref().map(|c| c.ts))
        .bind(page.after.as_ref().map(|c| c.id.as_str()))
        .bind(page.limit + 1)
        .fetch_all(&self.pool)
        .await?;

        Ok(build_page(bookings, page.limit, |b| {
            PageCursor::new(b.created_at, b.id.clone())
        }))
    }

    async fn set_status(&self, id: &str, status: BookingStatus) -> Result<Option<Booking>, StoreError> {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            "UPDATE bookings SET status = $2, updated_at = now() \
             WHERE id = $1 \
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;

        Ok(booking)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings")
            .fetch_one(&self.pool)
            .await?;

        Ok(total)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn upsert(&self, user: User) -> Result<User, StoreError> {
        // Profile refreshes keep the stored role and created_at: a returning
        // admin must not be demoted by a login-time profile write.
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users \
                 (id, email, display_name, role, skill_level, photo_url, created_at, last_login_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (id) DO UPDATE SET \
                 email = EXCLUDED.email, \
                 display_name = EXCLUDED.display_name, \
                 skill_level = EXCLUDED.skill_level, \
                 photo_url = EXCLUDED.photo_url, \
                 last_login_at = EXCLUDED.last_login_at \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(user.role)
        .bind(user.skill_level)
        .bind(&user.photo_url)
        .bind(user.created_at)
        .bind(user.last_login_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn get(&self, id: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn set_role(&self, id: &str, role: UserRole) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET role = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(role)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn stats(&self, now: DateTime<Utc>) -> Result<UserStats, StoreError> {
        let cutoff = now - Duration::days(ACTIVE_USER_WINDOW_DAYS);

        let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        let active_users: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE last_login_at > $1")
                .bind(cutoff)
                .fetch_one(&self.pool)
                .await?;

        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT role, COUNT(*) FROM users GROUP BY role")
                .fetch_all(&self.pool)
                .await?;

        Ok(UserStats {
            total_users,
            active_users,
            users_by_role: rows.into_iter().collect::<HashMap<_, _>>(),
        })
    }
}

#[async_trait]
impl AttendanceStore for PgStore {
    async fn record(&self, booking_id: &str) -> Result<RecordOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(String, bool)> =
            sqlx::query_as("SELECT event_id, counted FROM bookings WHERE id = $1 FOR UPDATE")
                .bind(booking_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some((event_id, counted)) = row else {
            return Ok(RecordOutcome::BookingMissing);
        };
        if counted {
            return Ok(RecordOutcome::AlreadyCounted);
        }

        // The capacity check and the increment are one statement, so
        // concurrent confirmations cannot race past max_attendees.
        let updated = sqlx::query(
            "UPDATE events \
             SET current_attendees = current_attendees + 1, updated_at = now() \
             WHERE id = $1 AND current_attendees < max_attendees",
        )
        .bind(&event_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(RecordOutcome::EventFull);
        }

        sqlx::query("UPDATE bookings SET counted = TRUE, updated_at = now() WHERE id = $1")
            .bind(booking_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(RecordOutcome::Recorded)
    }

    async fn release(&self, booking_id: &str) -> Result<ReleaseOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(String, bool)> =
            sqlx::query_as("SELECT event_id, counted FROM bookings WHERE id = $1 FOR UPDATE")
                .bind(booking_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some((event_id, counted)) = row else {
            return Ok(ReleaseOutcome::BookingMissing);
        };
        if !counted {
            return Ok(ReleaseOutcome::NotCounted);
        }

        sqlx::query(
            "UPDATE events \
             SET current_attendees = GREATEST(current_attendees - 1, 0), updated_at = now() \
             WHERE id = $1",
        )
        .bind(&event_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE bookings SET counted = FALSE, updated_at = now() WHERE id = $1")
            .bind(booking_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(ReleaseOutcome::Released)
    }
}
