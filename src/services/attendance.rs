use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::store::{AttendanceStore, RecordOutcome, ReleaseOutcome};
use crate::utils::error::AppError;

/// Seat accounting for events. A thin counter, not a reservation system:
/// callers check availability before asking for a seat, and every change
/// is keyed by booking id so replays and repeated admin actions cannot
/// count a booking twice.
#[derive(Clone)]
pub struct AttendeeCounter {
    store: Arc<dyn AttendanceStore>,
}

impl AttendeeCounter {
    pub fn new(store: Arc<dyn AttendanceStore>) -> Self {
        Self { store }
    }

    /// Take a seat for a booking. Refused when the event is already full.
    pub async fn record(&self, booking_id: &str) -> Result<RecordOutcome, AppError> {
        let outcome = self.store.record(booking_id).await?;
        match outcome {
            RecordOutcome::Recorded => info!(booking_id, "attendee recorded"),
            RecordOutcome::AlreadyCounted => debug!(booking_id, "attendee already recorded"),
            RecordOutcome::EventFull => warn!(booking_id, "event full, seat refused"),
            RecordOutcome::BookingMissing => warn!(booking_id, "no booking to record"),
        }
        Ok(outcome)
    }

    /// Return a booking's seat, if it holds one.
    pub async fn release(&self, booking_id: &str) -> Result<ReleaseOutcome, AppError> {
        let outcome = self.store.release(booking_id).await?;
        match outcome {
            ReleaseOutcome::Released => info!(booking_id, "attendee released"),
            ReleaseOutcome::NotCounted => debug!(booking_id, "booking held no seat"),
            ReleaseOutcome::BookingMissing => warn!(booking_id, "no booking to release"),
        }
        Ok(outcome)
    }
}
