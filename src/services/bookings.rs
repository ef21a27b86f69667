use std::sync::Arc;

use tracing::info;

use crate::models::{Booking, BookingStatus};
use crate::services::attendance::AttendeeCounter;
use crate::store::{BookingStore, RecordOutcome};
use crate::utils::error::AppError;

/// Admin-driven booking transitions. Seats move with the status: entering
/// `Confirmed` takes one, leaving it returns one. Repeating a transition
/// is a no-op.
pub struct BookingManager {
    bookings: Arc<dyn BookingStore>,
    counter: AttendeeCounter,
}

impl BookingManager {
    pub fn new(bookings: Arc<dyn BookingStore>, counter: AttendeeCounter) -> Self {
        Self { bookings, counter }
    }

    pub async fn transition(&self, booking_id: &str, to: BookingStatus) -> Result<Booking, AppError> {
        let booking = self
            .bookings
            .get(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Booking '{booking_id}' was not found")))?;

        if booking.status == to {
            return Ok(booking);
        }
        if !booking.status.can_transition(to) {
            return Err(AppError::ValidationError(format!(
                "Cannot move booking from {} to {}",
                booking.status, to
            )));
        }

        // Seat first when confirming, so a full event blocks the transition.
        if to == BookingStatus::Confirmed {
            match self.counter.record(booking_id).await? {
                RecordOutcome::Recorded | RecordOutcome::AlreadyCounted => {}
                RecordOutcome::EventFull => {
                    return Err(AppError::ValidationError("Event is fully booked".to_string()));
                }
                RecordOutcome::BookingMissing => {
                    return Err(AppError::InternalServerError(format!(
                        "booking '{booking_id}' vanished during transition"
                    )));
                }
            }
        }

        let updated = self
            .bookings
            .set_status(booking_id, to)
            .await?
            .ok_or_else(|| {
                AppError::InternalServerError(format!(
                    "booking '{booking_id}' vanished during transition"
                ))
            })?;

        if to == BookingStatus::Cancelled {
            self.counter.release(booking_id).await?;
        }

        info!(booking_id, from = %booking.status, to = %to, "booking status changed");

        // Reflect any seat release in the returned record.
        Ok(self.bookings.get(booking_id).await?.unwrap_or(updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::test_support::{pending_booking, sample_event};

    fn manager(store: Arc<MemoryStore>) -> BookingManager {
        let counter = AttendeeCounter::new(store.clone());
        BookingManager::new(store, counter)
    }

    async fn seed(store: &MemoryStore, max: i32) {
        store.insert_event(sample_event("E1", max));
        store.put_confirmed(&pending_booking("b1", "E1")).await.unwrap();
    }

    #[tokio::test]
    async fn approving_a_pending_booking_takes_one_seat() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, 10).await;

        let booking = manager(store.clone())
            .transition("b1", BookingStatus::Confirmed)
            .await
            .unwrap();

        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert!(booking.counted);
        assert_eq!(store.event("E1").unwrap().current_attendees, 1);
    }

    #[tokio::test]
    async fn approving_twice_counts_once() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, 10).await;
        let manager = manager(store.clone());

        manager.transition("b1", BookingStatus::Confirmed).await.unwrap();
        manager.transition("b1", BookingStatus::Confirmed).await.unwrap();

        assert_eq!(store.event("E1").unwrap().current_attendees, 1);
    }

    #[tokio::test]
    async fn cancelling_a_confirmed_booking_returns_the_seat() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, 10).await;
        let manager = manager(store.clone());

        manager.transition("b1", BookingStatus::Confirmed).await.unwrap();
        let booking = manager
            .transition("b1", BookingStatus::Cancelled)
            .await
            .unwrap();

        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert!(!booking.counted);
        assert_eq!(store.event("E1").unwrap().current_attendees, 0);
    }

    #[tokio::test]
    async fn cancelling_a_pending_booking_releases_nothing() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, 10).await;

        manager(store.clone())
            .transition("b1", BookingStatus::Cancelled)
            .await
            .unwrap();

        assert_eq!(store.event("E1").unwrap().current_attendees, 0);
    }

    #[tokio::test]
    async fn reconfirming_a_cancelled_booking_retakes_a_seat() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, 10).await;
        let manager = manager(store.clone());

        manager.transition("b1", BookingStatus::Confirmed).await.unwrap();
        manager.transition("b1", BookingStatus::Cancelled).await.unwrap();
        manager.transition("b1", BookingStatus::Confirmed).await.unwrap();

        assert_eq!(store.event("E1").unwrap().current_attendees, 1);
    }

    #[tokio::test]
    async fn confirming_into_a_full_event_fails_and_changes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let mut event = sample_event("E1", 1);
        event.current_attendees = 1;
        store.insert_event(event);
        store.put_confirmed(&pending_booking("b1", "E1")).await.unwrap();

        let result = manager(store.clone())
            .transition("b1", BookingStatus::Confirmed)
            .await;

        assert!(matches!(result, Err(AppError::ValidationError(_))));
        assert_eq!(
            store.booking("b1").unwrap().status,
            BookingStatus::Pending
        );
    }

    #[tokio::test]
    async fn demoting_to_pending_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, 10).await;
        let manager = manager(store.clone());

        manager.transition("b1", BookingStatus::Confirmed).await.unwrap();
        let result = manager.transition("b1", BookingStatus::Pending).await;

        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[tokio::test]
    async fn missing_booking_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let result = manager(store).transition("ghost", BookingStatus::Confirmed).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
