use super::result::{AsyncResult, IssuedCard, Outcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The durable outcome of one card request, keyed by the owning session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TerminalRecord {
    Issued {
        session_token: String,
        request_token: String,
        card: IssuedCard,
        recorded_at: DateTime<Utc>,
    },
    Declined {
        session_token: String,
        request_token: String,
        card_type: String,
        reason: String,
        recorded_at: DateTime<Utc>,
    },
}

impl TerminalRecord {
    /// Builds the record for `result`. An issued card missing its type inherits
    /// the one requested.
    pub fn from_result(session_token: &str, card_type: &str, result: &AsyncResult) -> Self {
        let recorded_at = Utc::now();
        match &result.outcome {
            Outcome::Issued(card) => {
                let mut card = card.clone();
                if card.card_type.is_empty() {
                    card.card_type = card_type.to_string();
                }
                TerminalRecord::Issued {
                    session_token: session_token.to_string(),
                    request_token: result.request_token.clone(),
                    card,
                    recorded_at,
                }
            }
            Outcome::Declined(decline) => TerminalRecord::Declined {
                session_token: session_token.to_string(),
                request_token: result.request_token.clone(),
                card_type: card_type.to_string(),
                reason: decline.reason.clone(),
                recorded_at,
            },
        }
    }

    pub fn session_token(&self) -> &str {
        match self {
            TerminalRecord::Issued { session_token, .. }
            | TerminalRecord::Declined { session_token, .. } => session_token,
        }
    }

    pub fn request_token(&self) -> &str {
        match self {
            TerminalRecord::Issued { request_token, .. }
            | TerminalRecord::Declined { request_token, .. } => request_token,
        }
    }
}
