use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Difficulty tag attached to events and user profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl SkillLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkillLevel::Beginner => "beginner",
            SkillLevel::Intermediate => "intermediate",
            SkillLevel::Advanced => "advanced",
        }
    }
}

impl std::fmt::Display for SkillLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bookable tutoring event. `current_attendees` only ever moves through
/// the attendance store, which upholds 0 <= current_attendees <= max_attendees.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub location: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub skill_level: SkillLevel,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub current_attendees: i32,
    pub max_attendees: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tutor_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn is_full(&self) -> bool {
        self.current_attendees >= self.max_attendees
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_event() -> Event {
        Event {
            id: "E1".to_string(),
            title: "Intro Crochet".to_string(),
            description: "First loops and chains".to_string(),
            date: Utc.with_ymd_and_hms(2025, 6, 1, 18, 0, 0).unwrap(),
            location: "Studio 4".to_string(),
            kind: "workshop".to_string(),
            skill_level: SkillLevel::Beginner,
            price: Decimal::new(1500, 2),
            current_attendees: 3,
            max_attendees: 10,
            tutor_id: None,
            created_at: Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn serializes_with_document_field_names() {
        let value = serde_json::to_value(sample_event()).unwrap();
        assert_eq!(value["type"], "workshop");
        assert_eq!(value["skillLevel"], "beginner");
        assert_eq!(value["currentAttendees"], 3);
        assert_eq!(value["maxAttendees"], 10);
        assert_eq!(value["price"], 15.0);
        assert!(value.get("tutorId").is_none());
    }

    #[test]
    fn is_full_at_capacity() {
        let mut event = sample_event();
        assert!(!event.is_full());
        event.current_attendees = event.max_attendees;
        assert!(event.is_full());
    }
}
