use super::result::{AsyncResult, Outcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const CARD_ISSUED: &str = "card.issued";
pub const CARD_DECLINED: &str = "card.declined";

/// Envelope POSTed to a subscriber's callback URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub data: AsyncResult,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl WebhookEvent {
    pub fn for_result(result: &AsyncResult, subscriber_name: &str, source: &str) -> Self {
        let mut metadata = Map::new();
        metadata.insert("suscriptor_name".into(), Value::from(subscriber_name));
        metadata.insert(
            "request_uuid".into(),
            Value::from(result.request_token.as_str()),
        );

        let event_type = match &result.outcome {
            Outcome::Issued(card) => {
                metadata.insert("card_type".into(), Value::from(card.card_type.as_str()));
                metadata.insert("has_pan".into(), Value::from(!card.pan.is_empty()));
                CARD_ISSUED
            }
            Outcome::Declined(decline) => {
                metadata.insert(
                    "decline_reason".into(),
                    Value::from(decline.reason.as_str()),
                );
                CARD_DECLINED
            }
        };

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_type: event_type.to_string(),
            timestamp: Utc::now(),
            source: source.to_string(),
            data: result.clone(),
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IssuedCard;

    #[test]
    fn test_issued_event_metadata() {
        let result = AsyncResult::issued(
            "r-9",
            IssuedCard {
                pan: "4000000000000002".into(),
                cvv: "999".into(),
                expiry_date: "2029-12-31".into(),
                card_type: "debit".into(),
            },
        )
        .with_subscriber("sub-1");

        let event = WebhookEvent::for_result(&result, "Acme", "webhook-service");
        assert_eq!(event.event_type, CARD_ISSUED);
        assert_eq!(event.metadata["suscriptor_name"], "Acme");
        assert_eq!(event.metadata["request_uuid"], "r-9");
        assert_eq!(event.metadata["card_type"], "debit");
        assert_eq!(event.metadata["has_pan"], true);
        assert!(!event.metadata.contains_key("decline_reason"));

        let body = serde_json::to_value(&event).unwrap();
        assert_eq!(body["type"], "card.issued");
        assert_eq!(body["source"], "webhook-service");
        assert_eq!(body["data"]["suscriptor_token"], "sub-1");
    }

    #[test]
    fn test_declined_event_metadata() {
        let result = AsyncResult::declined("r-3", "User not eligible due to age");
        let event = WebhookEvent::for_result(&result, "Acme", "relay");
        assert_eq!(event.event_type, CARD_DECLINED);
        assert_eq!(event.metadata["decline_reason"], "User not eligible due to age");
        assert!(!event.metadata.contains_key("has_pan"));
    }
}
