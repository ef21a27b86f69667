use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::models::{Booking, BookingStatus};
use crate::payments::events::{CompletedSession, GatewayEvent};
use crate::services::attendance::AttendeeCounter;
use crate::store::{BookingStore, RecordOutcome};
use crate::utils::error::AppError;

/// Processes verified gateway callbacks. Completed checkouts become
/// confirmed bookings keyed by session id; the keyed write plus the
/// counted flag make redeliveries harmless. Every other event type is
/// acknowledged untouched.
pub struct ConfirmationService {
    bookings: Arc<dyn BookingStore>,
    counter: AttendeeCounter,
}

impl ConfirmationService {
    pub fn new(bookings: Arc<dyn BookingStore>, counter: AttendeeCounter) -> Self {
        Self { bookings, counter }
    }

    /// Caller must have verified the callback signature already.
    pub async fn process_event(&self, event: GatewayEvent) -> Result<(), AppError> {
        if !event.is_checkout_completed() {
            debug!(event_type = %event.event_type, "ignoring gateway event");
            return Ok(());
        }

        let session: CompletedSession = match serde_json::from_value(event.data.object) {
            Ok(session) => session,
            Err(err) => {
                // Redelivery would fail the same way; acknowledge so the
                // gateway stops retrying and leave the rest to the logs.
                warn!(error = %err, "completed checkout carried an unusable session object");
                return Ok(());
            }
        };

        let now = Utc::now();
        let booking = Booking {
            id: session.id.clone(),
            event_id: session.metadata.event_id.clone(),
            user_id: session.metadata.user_id.clone(),
            status: BookingStatus::Confirmed,
            payment_id: session.payment_intent.clone().unwrap_or_default(),
            amount: Decimal::new(session.amount_total, 2),
            counted: false,
            created_at: now,
            updated_at: now,
        };

        self.bookings.put_confirmed(&booking).await?;

        match self.counter.record(&booking.id).await? {
            RecordOutcome::Recorded | RecordOutcome::AlreadyCounted => {
                info!(booking_id = %booking.id, event_id = %booking.event_id, "booking confirmed");
                Ok(())
            }
            RecordOutcome::EventFull => {
                // Capacity ran out between session creation and settlement.
                // The booking is cancelled and logged for a refund.
                warn!(
                    booking_id = %booking.id,
                    event_id = %booking.event_id,
                    "event filled before payment settled, cancelling booking for refund"
                );
                self.bookings
                    .set_status(&booking.id, BookingStatus::Cancelled)
                    .await?;
                Ok(())
            }
            RecordOutcome::BookingMissing => Err(AppError::InternalServerError(format!(
                "booking '{}' vanished during confirmation",
                booking.id
            ))),
        }
    }
}
