//! Fixtures and fakes shared by the unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::json;

use crate::config::{Config, PaymentConfig};
use crate::models::{Booking, BookingStatus, Event, SkillLevel};
use crate::payments::events::GatewayEvent;
use crate::payments::{CheckoutParams, CheckoutSession, PaymentError, PaymentGateway};
use crate::state::AppState;
use crate::store::MemoryStore;

pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Handler state wired to the in-memory store and a scripted gateway.
pub fn test_state(store: Arc<MemoryStore>, gateway: Arc<FakeGateway>) -> AppState {
    let config = Config {
        database_url: String::new(),
        port: 0,
        payment: PaymentConfig {
            secret_key: "sk_test_123".to_string(),
            publishable_key: "pk_test_123".to_string(),
            webhook_secret: TEST_WEBHOOK_SECRET.to_string(),
            base_url: "https://stitch.example".to_string(),
        },
    };
    AppState::new(
        config,
        store.clone(),
        store.clone(),
        store.clone(),
        store,
        gateway,
    )
}

pub fn sample_event(id: &str, max_attendees: i32) -> Event {
    let date = Utc.with_ymd_and_hms(2025, 6, 1, 18, 0, 0).unwrap();
    Event {
        id: id.to_string(),
        title: "Intro Crochet".to_string(),
        description: "First loops and chains".to_string(),
        date,
        location: "Studio 4".to_string(),
        kind: "workshop".to_string(),
        skill_level: SkillLevel::Beginner,
        price: Decimal::new(1500, 2),
        current_attendees: 0,
        max_attendees,
        tutor_id: None,
        created_at: date,
        updated_at: date,
    }
}

pub fn pending_booking(id: &str, event_id: &str) -> Booking {
    let now = Utc.with_ymd_and_hms(2025, 5, 20, 10, 0, 0).unwrap();
    Booking {
        id: id.to_string(),
        event_id: event_id.to_string(),
        user_id: "U1".to_string(),
        status: BookingStatus::Pending,
        payment_id: String::new(),
        amount: Decimal::new(1500, 2),
        counted: false,
        created_at: now,
        updated_at: now,
    }
}

/// A `checkout.session.completed` callback as the gateway would send it.
pub fn completed_event(
    session_id: &str,
    event_id: &str,
    user_id: &str,
    amount_total: i64,
) -> GatewayEvent {
    serde_json::from_value(json!({
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": session_id,
                "object": "checkout.session",
                "payment_intent": "pi_test_123",
                "amount_total": amount_total,
                "metadata": { "eventId": event_id, "userId": user_id }
            }
        }
    }))
    .unwrap()
}

pub fn unknown_event(event_type: &str) -> GatewayEvent {
    serde_json::from_value(json!({
        "type": event_type,
        "data": { "object": { "id": "obj_1" } }
    }))
    .unwrap()
}

/// Scripted gateway: hands out a fixed session id (or a fixed failure) and
/// records what it was asked to create.
pub struct FakeGateway {
    session_id: String,
    fail: bool,
    requests: Mutex<Vec<CheckoutParams>>,
}

impl FakeGateway {
    pub fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            fail: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            session_id: String::new(),
            fail: true,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn last_params(&self) -> Option<CheckoutParams> {
        self.requests.lock().unwrap().last().cloned()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_checkout_session(
        &self,
        params: CheckoutParams,
    ) -> Result<CheckoutSession, PaymentError> {
        self.requests.lock().unwrap().push(params);
        if self.fail {
            return Err(PaymentError::Gateway {
                status: 503,
                message: "gateway unavailable".to_string(),
            });
        }
        Ok(CheckoutSession {
            id: self.session_id.clone(),
            url: Some(format!("https://checkout.example/{}", self.session_id)),
        })
    }
}
