use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use crate::payments::{to_minor_units, CheckoutParams, CheckoutSession, PaymentGateway};
use crate::store::EventStore;
use crate::utils::error::AppError;

/// Body of a booking request. The price is what the client was shown; the
/// gateway line item is derived from it, not from the stored event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub event_id: String,
    pub user_id: String,
    pub event_title: String,
    pub price: f64,
}

/// Opens hosted checkout sessions. No seat is taken here: capacity is
/// consumed when the gateway confirms payment, so an abandoned checkout
/// never strands a seat. The availability check below is a courtesy read,
/// not a reservation; concurrent requests for the last seat can both pass
/// it and both get sessions.
pub struct CheckoutService {
    events: Arc<dyn EventStore>,
    gateway: Arc<dyn PaymentGateway>,
}

impl CheckoutService {
    pub fn new(events: Arc<dyn EventStore>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { events, gateway }
    }

    pub async fn create_session(&self, request: CheckoutRequest) -> Result<CheckoutSession, AppError> {
        validate(&request)?;

        let event = self
            .events
            .get(&request.event_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event '{}' was not found", request.event_id)))?;

        if event.is_full() {
            return Err(AppError::ValidationError("Event is fully booked".to_string()));
        }

        let session = self
            .gateway
            .create_checkout_session(CheckoutParams {
                event_id: request.event_id.clone(),
                user_id: request.user_id.clone(),
                product_name: request.event_title.clone(),
                unit_amount: to_minor_units(request.price),
            })
            .await?;

        info!(
            session_id = %session.id,
            event_id = %request.event_id,
            user_id = %request.user_id,
            "checkout session created"
        );
        Ok(session)
    }
}

fn validate(request: &CheckoutRequest) -> Result<(), AppError> {
    for (value, name) in [
        (&request.event_id, "eventId"),
        (&request.user_id, "userId"),
        (&request.event_title, "eventTitle"),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::ValidationError(format!("{name} is required")));
        }
    }
    if !request.price.is_finite() || request.price < 0.0 {
        return Err(AppError::ValidationError(
            "price must be a non-negative number".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::PaymentError;
    use crate::store::MemoryStore;
    use crate::test_support::{sample_event, FakeGateway};

    fn service(store: Arc<MemoryStore>, gateway: Arc<FakeGateway>) -> CheckoutService {
        CheckoutService::new(store, gateway)
    }

    fn request(event_id: &str, price: f64) -> CheckoutRequest {
        CheckoutRequest {
            event_id: event_id.to_string(),
            user_id: "U1".to_string(),
            event_title: "Intro Crochet".to_string(),
            price,
        }
    }

    #[tokio::test]
    async fn returns_the_gateway_session_id() {
        let store = Arc::new(MemoryStore::new());
        store.insert_event(sample_event("E1", 10));
        let gateway = Arc::new(FakeGateway::new("cs_test_abc"));

        let session = service(store, gateway.clone())
            .create_session(request("E1", 15.0))
            .await
            .unwrap();

        assert_eq!(session.id, "cs_test_abc");
        let sent = gateway.last_params().unwrap();
        assert_eq!(sent.unit_amount, 1500);
        assert_eq!(sent.event_id, "E1");
        assert_eq!(sent.product_name, "Intro Crochet");
    }

    #[tokio::test]
    async fn converts_fractional_prices_to_minor_units() {
        let store = Arc::new(MemoryStore::new());
        store.insert_event(sample_event("E1", 10));
        let gateway = Arc::new(FakeGateway::new("cs_1"));

        service(store, gateway.clone())
            .create_session(request("E1", 24.99))
            .await
            .unwrap();

        assert_eq!(gateway.last_params().unwrap().unit_amount, 2499);
    }

    #[tokio::test]
    async fn rejects_missing_fields_without_calling_the_gateway() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(FakeGateway::new("cs_1"));

        let result = service(store, gateway.clone())
            .create_session(CheckoutRequest {
                event_id: String::new(),
                user_id: "U1".to_string(),
                event_title: "T".to_string(),
                price: 10.0,
            })
            .await;

        assert!(matches!(result, Err(AppError::ValidationError(_))));
        assert!(gateway.last_params().is_none());
    }

    #[tokio::test]
    async fn rejects_non_finite_and_negative_prices() {
        let store = Arc::new(MemoryStore::new());
        store.insert_event(sample_event("E1", 10));
        let gateway = Arc::new(FakeGateway::new("cs_1"));
        let service = service(store, gateway);

        for price in [-1.0, f64::NAN, f64::INFINITY] {
            let result = service.create_session(request("E1", price)).await;
            assert!(matches!(result, Err(AppError::ValidationError(_))));
        }
    }

    #[tokio::test]
    async fn unknown_event_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(FakeGateway::new("cs_1"));

        let result = service(store, gateway)
            .create_session(request("missing", 10.0))
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn refuses_a_full_event() {
        let store = Arc::new(MemoryStore::new());
        let mut event = sample_event("E1", 2);
        event.current_attendees = 2;
        store.insert_event(event);
        let gateway = Arc::new(FakeGateway::new("cs_1"));

        let result = service(store, gateway)
            .create_session(request("E1", 10.0))
            .await;

        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[tokio::test]
    async fn gateway_failures_surface_unretried() {
        let store = Arc::new(MemoryStore::new());
        store.insert_event(sample_event("E1", 10));
        let gateway = Arc::new(FakeGateway::failing());

        let result = service(store, gateway.clone())
            .create_session(request("E1", 10.0))
            .await;

        assert!(matches!(
            result,
            Err(AppError::GatewayError(PaymentError::Gateway { .. }))
        ));
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test]
    async fn concurrent_requests_for_the_last_seat_both_get_sessions() {
        // The availability check is optimistic: both requests read one seat
        // remaining and both receive a session. Settlement is where the
        // second booking gets refused.
        let store = Arc::new(MemoryStore::new());
        let mut event = sample_event("E1", 5);
        event.current_attendees = 4;
        store.insert_event(event);
        let gateway = Arc::new(FakeGateway::new("cs_n"));
        let service = Arc::new(CheckoutService::new(store, gateway));

        let first = tokio::spawn({
            let service = service.clone();
            async move { service.create_session(request("E1", 10.0)).await }
        });
        let second = tokio::spawn({
            let service = service.clone();
            async move { service.create_session(request("E1", 10.0)).await }
        });

        assert!(first.await.unwrap().is_ok());
        assert!(second.await.unwrap().is_ok());
    }
}
