use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::json;
use tracing::{error, warn};

use crate::payments::events::GatewayEvent;
use crate::payments::webhook::{verify_signature, SignatureError, SIGNATURE_HEADER};
use crate::state::AppState;

/// POST /api/webhook
///
/// The gateway's asynchronous callback. Signature verification is the sole
/// authentication boundary in front of booking creation: a bad signature is
/// the only 400 path, anything verified is acknowledged with
/// `{"received": true}` so the gateway does not build a retry backlog.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let verified = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(SignatureError::MissingHeader)
        .and_then(|signature| {
            verify_signature(
                &state.config.payment.webhook_secret,
                &body,
                signature,
                Utc::now(),
            )
        });

    if let Err(err) = verified {
        warn!(error = %err, "Webhook signature verification failed");
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Webhook Error" })),
        )
            .into_response();
    }

    let event: GatewayEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(err) => {
            warn!(error = %err, "Webhook body failed to parse");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Webhook Error" })),
            )
                .into_response();
        }
    };

    match state.confirmation.process_event(event).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "received": true }))).into_response(),
        Err(err) => {
            // Non-2xx means the gateway will redeliver; store failures are
            // the one case where that is what we want.
            error!(error = ?err, "Webhook processing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Webhook handler failed" })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    use super::*;
    use crate::models::BookingStatus;
    use crate::payments::webhook::sign_payload;
    use crate::routes::create_routes;
    use crate::store::MemoryStore;
    use crate::test_support::{sample_event, test_state, FakeGateway, TEST_WEBHOOK_SECRET};

    fn completed_body(session_id: &str, amount_total: i64) -> String {
        format!(
            r#"{{"type":"checkout.session.completed","data":{{"object":{{"id":"{session_id}","payment_intent":"pi_1","amount_total":{amount_total},"metadata":{{"eventId":"E1","userId":"U1"}}}}}}}}"#
        )
    }

    fn webhook_request(body: &str, signature: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/webhook")
            .header("stripe-signature", signature)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn verified_completed_callback_is_acknowledged_and_books() {
        let store = Arc::new(MemoryStore::new());
        store.insert_event(sample_event("E1", 10));
        let app = create_routes(test_state(store.clone(), Arc::new(FakeGateway::new("cs_1"))));

        let body = completed_body("cs_test_abc", 1500);
        let signature = sign_payload(TEST_WEBHOOK_SECRET, body.as_bytes(), Utc::now().timestamp());

        let response = app.oneshot(webhook_request(&body, &signature)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "received": true }));

        let booking = store.booking("cs_test_abc").unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(store.event("E1").unwrap().current_attendees, 1);
    }

    #[tokio::test]
    async fn bad_signature_is_rejected_without_any_mutation() {
        let store = Arc::new(MemoryStore::new());
        store.insert_event(sample_event("E1", 10));
        let app = create_routes(test_state(store.clone(), Arc::new(FakeGateway::new("cs_1"))));

        let body = completed_body("cs_test_abc", 1500);
        let signature = sign_payload("whsec_wrong", body.as_bytes(), Utc::now().timestamp());

        let response = app.oneshot(webhook_request(&body, &signature)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({ "error": "Webhook Error" }));
        assert_eq!(store.booking_records(), 0);
        assert_eq!(store.event("E1").unwrap().current_attendees, 0);
    }

    #[tokio::test]
    async fn missing_signature_header_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let app = create_routes(test_state(store.clone(), Arc::new(FakeGateway::new("cs_1"))));

        let body = completed_body("cs_test_abc", 1500);
        let request = Request::builder()
            .method("POST")
            .uri("/api/webhook")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(store.booking_records(), 0);
    }

    #[tokio::test]
    async fn unknown_event_types_are_acknowledged() {
        let store = Arc::new(MemoryStore::new());
        store.insert_event(sample_event("E1", 10));
        let app = create_routes(test_state(store.clone(), Arc::new(FakeGateway::new("cs_1"))));

        let body = r#"{"type":"customer.created","data":{"object":{"id":"cus_1"}}}"#;
        let signature = sign_payload(TEST_WEBHOOK_SECRET, body.as_bytes(), Utc::now().timestamp());

        let response = app.oneshot(webhook_request(body, &signature)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "received": true }));
        assert_eq!(store.booking_records(), 0);
        assert_eq!(store.event("E1").unwrap().current_attendees, 0);
    }

    #[tokio::test]
    async fn session_id_round_trips_from_checkout_to_booking() {
        let store = Arc::new(MemoryStore::new());
        store.insert_event(sample_event("E1", 10));
        let state = test_state(store.clone(), Arc::new(FakeGateway::new("cs_test_abc")));

        // Book through the checkout endpoint first.
        let checkout = Request::builder()
            .method("POST")
            .uri("/api/checkout-session")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"eventId":"E1","userId":"U1","eventTitle":"Intro Crochet","price":15}"#,
            ))
            .unwrap();
        let response = create_routes(state.clone()).oneshot(checkout).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let session_id = body_json(response).await["sessionId"]
            .as_str()
            .unwrap()
            .to_string();
        assert_eq!(session_id, "cs_test_abc");

        // Then settle it through the callback.
        let body = completed_body(&session_id, 1500);
        let signature = sign_payload(TEST_WEBHOOK_SECRET, body.as_bytes(), Utc::now().timestamp());
        let response = create_routes(state)
            .oneshot(webhook_request(&body, &signature))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let booking = store.booking(&session_id).unwrap();
        assert_eq!(booking.event_id, "E1");
        assert_eq!(booking.user_id, "U1");
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.amount, rust_decimal::Decimal::new(1500, 2));
    }
}
