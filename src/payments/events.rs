use serde::Deserialize;

/// The callback event type that carries a settled checkout.
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// Envelope of a gateway callback. `data.object` stays untyped until the
/// event type is known; everything other than a completed checkout is
/// acknowledged without being decoded further.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: GatewayEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEventData {
    pub object: serde_json::Value,
}

impl GatewayEvent {
    pub fn is_checkout_completed(&self) -> bool {
        self.event_type == CHECKOUT_COMPLETED
    }
}

/// The completed session fields the confirmation flow consumes.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletedSession {
    pub id: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
    pub amount_total: i64,
    pub metadata: SessionMetadata,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionMetadata {
    #[serde(rename = "eventId")]
    pub event_id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
}
