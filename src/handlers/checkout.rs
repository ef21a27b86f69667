use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::services::CheckoutRequest;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

/// POST /api/checkout-session
///
/// Wire contract is fixed by the booking clients: `{"sessionId": ...}` on
/// success, `{"error": ...}` otherwise, with a generic message either way.
pub async fn create_checkout_session(
    State(state): State<AppState>,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(request)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Error creating checkout session" })),
        )
            .into_response();
    };

    match state.checkout.create_session(request).await {
        Ok(session) => (StatusCode::OK, Json(json!({ "sessionId": session.id }))).into_response(),
        Err(err) => {
            error!(error = ?err, "Error creating checkout session");
            let status = match err {
                AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
                // Everything else, missing events included, stays a
                // generic failure on this endpoint.
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (
                status,
                Json(json!({ "error": "Error creating checkout session" })),
            )
                .into_response()
        }
    }
}

/// GET /api/payments/config — the client-side key the frontend boots the
/// gateway widget with.
pub async fn payment_config(State(state): State<AppState>) -> Response {
    success(
        json!({ "publishableKey": state.config.payment.publishable_key }),
        "Payment configuration fetched",
    )
    .into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    use super::*;
    use crate::routes::create_routes;
    use crate::store::MemoryStore;
    use crate::test_support::{sample_event, test_state, FakeGateway};

    fn checkout_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/checkout-session")
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
    async fn returns_the_session_id_on_success() {
        let store = Arc::new(MemoryStore::new());
        store.insert_event(sample_event("E1", 10));
        let app = create_routes(test_state(store, Arc::new(FakeGateway::new("cs_test_abc"))));

        let response = app
            .oneshot(checkout_request(
                r#"{"eventId":"E1","userId":"U1","eventTitle":"Intro Crochet","price":15}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "sessionId": "cs_test_abc" }));
    }

    #[tokio::test]
    async fn malformed_bodies_get_the_generic_error_shape() {
        let store = Arc::new(MemoryStore::new());
        let app = create_routes(test_state(store, Arc::new(FakeGateway::new("cs_1"))));

        let response = app
            .oneshot(checkout_request(r#"{"eventId":"E1"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "Error creating checkout session" })
        );
    }

    #[tokio::test]
    async fn missing_events_surface_as_a_generic_failure() {
        let store = Arc::new(MemoryStore::new());
        let app = create_routes(test_state(store, Arc::new(FakeGateway::new("cs_1"))));

        let response = app
            .oneshot(checkout_request(
                r#"{"eventId":"ghost","userId":"U1","eventTitle":"T","price":10}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "Error creating checkout session" })
        );
    }

    #[tokio::test]
    async fn gateway_failures_surface_as_a_generic_failure() {
        let store = Arc::new(MemoryStore::new());
        store.insert_event(sample_event("E1", 10));
        let app = create_routes(test_state(store, Arc::new(FakeGateway::failing())));

        let response = app
            .oneshot(checkout_request(
                r#"{"eventId":"E1","userId":"U1","eventTitle":"T","price":10}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn payment_config_exposes_the_publishable_key() {
        let store = Arc::new(MemoryStore::new());
        let app = create_routes(test_state(store, Arc::new(FakeGateway::new("cs_1"))));

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/payments/config")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["publishableKey"], "pk_test_123");
    }
}
