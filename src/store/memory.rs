use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::models::{Booking, BookingStatus, Event, User, UserRole};
use crate::store::{
    build_page, AttendanceStore, BookingStore, EventCounts, EventFilter, EventPatch, EventStore,
    Page, PageCursor, PageRequest, RecordOutcome, ReleaseOutcome, StoreError, UserStats, UserStore,
};

/// In-memory store with the same per-record semantics as the Postgres
/// store. One mutex guards all three maps, which makes the attendance
/// operations atomic across bookings and events. Used by the test suite.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    events: HashMap<String, Event>,
    bookings: HashMap<String, Booking>,
    users: HashMap<String, User>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test helper: seed an event record directly.
    pub fn insert_event(&self, event: Event) {
        let mut inner = self.inner.lock().unwrap();
        inner.events.insert(event.id.clone(), event);
    }

    /// Test helper: snapshot an event record.
    pub fn event(&self, id: &str) -> Option<Event> {
        self.inner.lock().unwrap().events.get(id).cloned()
    }

    /// Test helper: snapshot a booking record.
    pub fn booking(&self, id: &str) -> Option<Booking> {
        self.inner.lock().unwrap().bookings.get(id).cloned()
    }

    /// Test helper: total number of booking records.
    pub fn booking_records(&self) -> usize {
        self.inner.lock().unwrap().bookings.len()
    }
}

fn matches_filter(event: &Event, filter: &EventFilter) -> bool {
    if let Some(level) = filter.skill_level {
        if event.skill_level != level {
            return false;
        }
    }
    if let Some(kind) = &filter.kind {
        if &event.kind != kind {
            return false;
        }
    }
    if let Some(tutor_id) = &filter.tutor_id {
        if event.tutor_id.as_ref() != Some(tutor_id) {
            return false;
        }
    }
    if let Some(start) = filter.start_date {
        if event.date < start {
            return false;
        }
    }
    if let Some(end) = filter.end_date {
        if event.date > end {
            return false;
        }
    }
    true
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn create(&self, event: Event) -> Result<Event, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.events.insert(event.id.clone(), event.clone());
        Ok(event)
    }

    async fn get(&self, id: &str) -> Result<Option<Event>, StoreError> {
        Ok(self.inner.lock().unwrap().events.get(id).cloned())
    }

    async fn list(&self, filter: &EventFilter, page: &PageRequest) -> Result<Page<Event>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut events: Vec<Event> = inner
            .events
            .values()
            .filter(|e| matches_filter(e, filter))
            .filter(|e| match &page.after {
                Some(cursor) => (e.date, e.id.as_str()) > (cursor.ts, cursor.id.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        events.sort_by(|a, b| (a.date, &a.id).cmp(&(b.date, &b.id)));
        events.truncate(page.limit as usize + 1);

        Ok(build_page(events, page.limit, |e| {
            PageCursor::new(e.date, e.id.clone())
        }))
    }

    async fn update(&self, id: &str, patch: &EventPatch) -> Result<Option<Event>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(event) = inner.events.get_mut(id) else {
            return Ok(None);
        };

        if let Some(title) = &patch.title {
            event.title = title.clone();
        }
        if let Some(description) = &patch.description {
            event.description = description.clone();
        }
        if let Some(date) = patch.date {
            event.date = date;
        }
        if let Some(location) = &patch.location {
            event.location = location.clone();
        }
        if let Some(kind) = &patch.kind {
            event.kind = kind.clone();
        }
        if let Some(level) = patch.skill_level {
            event.skill_level = level;
        }
        if let Some(price) = patch.price {
            event.price = price;
        }
        if let Some(max) = patch.max_attendees {
            event.max_attendees = max.max(event.current_attendees);
        }
        if let Some(tutor_id) = &patch.tutor_id {
            event.tutor_id = Some(tutor_id.clone());
        }
        event.updated_at = Utc::now();

        Ok(Some(event.clone()))
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.inner.lock().unwrap().events.remove(id).is_some())
    }

    async fn counts(&self, now: DateTime<Utc>) -> Result<EventCounts, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut events_by_skill_level: HashMap<String, i64> = HashMap::new();
        let mut upcoming_events = 0;

        for event in inner.events.values() {
            if event.date > now {
                upcoming_events += 1;
            }
            *events_by_skill_level
                .entry(event.skill_level.to_string())
                .or_default() += 1;
        }

        Ok(EventCounts {
            total_events: inner.events.len() as i64,
            upcoming_events,
            events_by_skill_level,
        })
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn put_confirmed(&self, booking: &Booking) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.bookings.entry(booking.id.clone()) {
            Entry::Occupied(mut occupied) => {
                // Replay: payload fields overwrite, created_at and the
                // counted flag stay with the first write.
                let existing = occupied.get_mut();
                existing.event_id = booking.event_id.clone();
                existing.user_id = booking.user_id.clone();
                existing.status = booking.status;
                existing.payment_id = booking.payment_id.clone();
                existing.amount = booking.amount;
                existing.updated_at = booking.updated_at;
            }
            Entry::Vacant(vacant) => {
                vacant.insert(booking.clone());
            }
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Booking>, StoreError> {
        Ok(self.inner.lock().unwrap().bookings.get(id).cloned())
    }

    async fn list(&self, page: &PageRequest) -> Result<Page<Booking>, StoreError> {
        self.list_filtered(None, None, page)
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        status: Option<BookingStatus>,
        page: &PageRequest,
    ) -> Result<Page<Booking>, StoreError> {
        self.list_filtered(Some(user_id), status, page)
    }

    async fn set_status(&self, id: &str, status: BookingStatus) -> Result<Option<Booking>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(booking) = inner.bookings.get_mut(id) else {
            return Ok(None);
        };
        booking.status = status;
        booking.updated_at = Utc::now();
        Ok(Some(booking.clone()))
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(self.inner.lock().unwrap().bookings.len() as i64)
    }
}

impl MemoryStore {
    fn list_filtered(
        &self,
        user_id: Option<&str>,
        status: Option<BookingStatus>,
        page: &PageRequest,
    ) -> Result<Page<Booking>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut bookings: Vec<Booking> = inner
            .bookings
            .values()
            .filter(|b| user_id.map_or(true, |u| b.user_id == u))
            .filter(|b| status.map_or(true, |s| b.status == s))
            .filter(|b| match &page.after {
                Some(cursor) => (b.created_at, b.id.as_str()) < (cursor.ts, cursor.id.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        bookings.sort_by(|a, b| (b.created_at, &b.id).cmp(&(a.created_at, &a.id)));
        bookings.truncate(page.limit as usize + 1);

        Ok(build_page(bookings, page.limit, |b| {
            PageCursor::new(b.created_at, b.id.clone())
        }))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn upsert(&self, user: User) -> Result<User, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let stored = match inner.users.entry(user.id.clone()) {
            Entry::Occupied(mut occupied) => {
                let existing = occupied.get_mut();
                existing.email = user.email;
                existing.display_name = user.display_name;
                existing.skill_level = user.skill_level;
                existing.photo_url = user.photo_url;
                existing.last_login_at = user.last_login_at;
                existing.clone()
            }
            Entry::Vacant(vacant) => vacant.insert(user).clone(),
        };
        Ok(stored)
    }

    async fn get(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.inner.lock().unwrap().users.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut users: Vec<User> = inner.users.values().cloned().collect();
        users.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(users)
    }

    async fn set_role(&self, id: &str, role: UserRole) -> Result<Option<User>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(user) = inner.users.get_mut(id) else {
            return Ok(None);
        };
        user.role = role;
        Ok(Some(user.clone()))
    }

    async fn stats(&self, now: DateTime<Utc>) -> Result<UserStats, StoreError> {
        let inner = self.inner.lock().unwrap();
        let cutoff = now - Duration::days(30);
        let mut users_by_role: HashMap<String, i64> = HashMap::new();
        let mut active_users = 0;

        for user in inner.users.values() {
            if user.last_login_at > cutoff {
                active_users += 1;
            }
            *users_by_role.entry(user.role.to_string()).or_default() += 1;
        }

        Ok(UserStats {
            total_users: inner.users.len() as i64,
            active_users,
            users_by_role,
        })
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn record(&self, booking_id: &str) -> Result<RecordOutcome, StoreError> {
        let mut inner = self.inner.lock().unwrap();

        let Some(booking) = inner.bookings.get(booking_id) else {
            return Ok(RecordOutcome::BookingMissing);
        };
        if booking.counted {
            return Ok(RecordOutcome::AlreadyCounted);
        }
        let event_id = booking.event_id.clone();

        match inner.events.get_mut(&event_id) {
            Some(event) if !event.is_full() => {
                event.current_attendees += 1;
                event.updated_at = Utc::now();
            }
            _ => return Ok(RecordOutcome::EventFull),
        }

        let booking = inner.bookings.get_mut(booking_id).unwrap();
        booking.counted = true;
        booking.updated_at = Utc::now();
        Ok(RecordOutcome::Recorded)
    }

    async fn release(&self, booking_id: &str) -> Result<ReleaseOutcome, StoreError> {
        let mut inner = self.inner.lock().unwrap();

        let Some(booking) = inner.bookings.get(booking_id) else {
            return Ok(ReleaseOutcome::BookingMissing);
        };
        if !booking.counted {
            return Ok(ReleaseOutcome::NotCounted);
        }
        let event_id = booking.event_id.clone();

        if let Some(event) = inner.events.get_mut(&event_id) {
            event.current_attendees = (event.current_attendees - 1).max(0);
            event.updated_at = Utc::now();
        }

        let booking = inner.bookings.get_mut(booking_id).unwrap();
        booking.counted = false;
        booking.updated_at = Utc::now();
        Ok(ReleaseOutcome::Released)
    }
}
