use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Booking lifecycle. The payment callback creates bookings directly in
/// `Confirmed`; admins move them between the remaining states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// Legal admin transitions. Cancelled bookings may be re-confirmed,
    /// which re-reserves capacity through the attendance store.
    pub fn can_transition(self, to: BookingStatus) -> bool {
        matches!(
            (self, to),
            (BookingStatus::Pending, BookingStatus::Confirmed)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
                | (BookingStatus::Confirmed, BookingStatus::Cancelled)
                | (BookingStatus::Cancelled, BookingStatus::Confirmed)
        )
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A booking keyed by its checkout-session identifier, which gives the
/// payment callback at-most-one booking per session. Never deleted, only
/// transitioned. `counted` records whether this booking currently holds a
/// seat on its event.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub event_id: String,
    pub user_id: String,
    pub status: BookingStatus,
    pub payment_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub counted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn transition_rules() {
        use BookingStatus::*;
        assert!(Pending.can_transition(Confirmed));
        assert!(Pending.can_transition(Cancelled));
        assert!(Confirmed.can_transition(Cancelled));
        assert!(Cancelled.can_transition(Confirmed));

        assert!(!Confirmed.can_transition(Pending));
        assert!(!Cancelled.can_transition(Pending));
        assert!(!Pending.can_transition(Pending));
        assert!(!Confirmed.can_transition(Confirmed));
    }

    #[test]
    fn serializes_with_document_field_names() {
        let booking = Booking {
            id: "cs_test_abc".to_string(),
            event_id: "E1".to_string(),
            user_id: "U1".to_string(),
            status: BookingStatus::Confirmed,
            payment_id: "pi_123".to_string(),
            amount: Decimal::new(1500, 2),
            counted: true,
            created_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        };

        let value = serde_json::to_value(booking).unwrap();
        assert_eq!(value["id"], "cs_test_abc");
        assert_eq!(value["eventId"], "E1");
        assert_eq!(value["userId"], "U1");
        assert_eq!(value["status"], "confirmed");
        assert_eq!(value["paymentId"], "pi_123");
        assert_eq!(value["amount"], 15.0);
    }
}
