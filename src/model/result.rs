use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedCard {
    pub pan: String,
    pub cvv: String,
    pub expiry_date: String,
    /// Issuers that omit it get the card type from the pending request.
    #[serde(default)]
    pub card_type: String,
}

impl fmt::Debug for IssuedCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedCard")
            .field("pan", &mask_pan(&self.pan))
            .field("cvv", &"***")
            .field("expiry_date", &self.expiry_date)
            .field("card_type", &self.card_type)
            .finish()
    }
}

fn mask_pan(pan: &str) -> String {
    let visible: String = pan
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("****{visible}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclineReason {
    pub reason: String,
}

/// What the issuer decided. Exactly one of the two, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Declined(DeclineReason),
    Issued(IssuedCard),
}

impl Outcome {
    pub fn status(&self) -> &'static str {
        match self {
            Outcome::Declined(_) => "declined",
            Outcome::Issued(_) => "issued",
        }
    }
}

/// An issuer result on its way back to the waiting party.
///
/// On the wire this is the issuer's flat callback body:
///
/// ```text
/// {"issued_card": {...}, "request_uuid": "...", "suscriptor_token": "...", "status": "issued"}
/// ```
///
/// Decoding fails unless exactly one of `decline_reason` and `issued_card` is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ResultWire", into = "ResultWire")]
pub struct AsyncResult {
    pub request_token: String,
    pub subscriber_token: Option<String>,
    pub session_token: Option<String>,
    pub outcome: Outcome,
}

impl AsyncResult {
    pub fn issued(request_token: impl Into<String>, card: IssuedCard) -> Self {
        Self {
            request_token: request_token.into(),
            subscriber_token: None,
            session_token: None,
            outcome: Outcome::Issued(card),
        }
    }

    pub fn declined(request_token: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            request_token: request_token.into(),
            subscriber_token: None,
            session_token: None,
            outcome: Outcome::Declined(DeclineReason {
                reason: reason.into(),
            }),
        }
    }

    pub fn with_subscriber(mut self, token: impl Into<String>) -> Self {
        self.subscriber_token = Some(token.into());
        self
    }

    pub fn with_session(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }
}

#[derive(Serialize, Deserialize)]
struct ResultWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    decline_reason: Option<DeclineReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    issued_card: Option<IssuedCard>,
    request_uuid: String,
    #[serde(default)]
    suscriptor_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_token: Option<String>,
    #[serde(default)]
    status: String,
}

impl TryFrom<ResultWire> for AsyncResult {
    type Error = String;

    fn try_from(wire: ResultWire) -> Result<Self, Self::Error> {
        let outcome = match (wire.decline_reason, wire.issued_card) {
            (Some(reason), None) => Outcome::Declined(reason),
            (None, Some(card)) => Outcome::Issued(card),
            (Some(_), Some(_)) => {
                return Err("result carries both decline_reason and issued_card".into())
            }
            (None, None) => {
                return Err("result carries neither decline_reason nor issued_card".into())
            }
        };
        let subscriber_token = Some(wire.suscriptor_token).filter(|t| !t.is_empty());
        let session_token = wire.session_token.filter(|t| !t.is_empty());
        Ok(Self {
            request_token: wire.request_uuid,
            subscriber_token,
            session_token,
            outcome,
        })
    }
}

impl From<AsyncResult> for ResultWire {
    fn from(result: AsyncResult) -> Self {
        let status = result.outcome.status().to_string();
        let (decline_reason, issued_card) = match result.outcome {
            Outcome::Declined(reason) => (Some(reason), None),
            Outcome::Issued(card) => (None, Some(card)),
        };
        Self {
            decline_reason,
            issued_card,
            request_uuid: result.request_token,
            suscriptor_token: result.subscriber_token.unwrap_or_default(),
            session_token: result.session_token,
            status,
        }
    }
}
