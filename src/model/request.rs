use super::identity::IdentitySnapshot;
use serde::{Deserialize, Serialize};

/// In-flight context for one card request, stored under `request:<token>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    /// UUID minted by the caller before `put`.
    pub token: String,
    pub identity: IdentitySnapshot,
    pub card_type: String,
    /// Session that started the request. Older entries may lack it, in which
    /// case the resolver falls back to scanning sessions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}

/// Body sent to the issuer.
///
/// The issuer speaks camelCase. `sessionToken` is optional on the wire so that
/// issuers which do not echo it keep working.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRequest {
    pub name: String,
    pub lastname: String,
    pub birth_date: String,
    pub country_code: String,
    pub card_type: String,
    pub suscriptor_token: String,
    #[serde(rename = "requestUUID")]
    pub request_uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}

impl IssueRequest {
    pub fn for_pending(pending: &PendingRequest, subscriber_token: Option<&str>) -> Self {
        Self {
            name: pending.identity.name.clone(),
            lastname: pending.identity.lastname.clone(),
            birth_date: pending.identity.birth_date.clone(),
            country_code: pending.identity.country_code.clone(),
            card_type: pending.card_type.clone(),
            suscriptor_token: subscriber_token.unwrap_or_default().to_string(),
            request_uuid: pending.token.clone(),
            session_token: pending.session_token.clone(),
        }
    }
}
