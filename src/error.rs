//! Error types shared by every relay component.

use crate::framework::StoreError;
use thiserror::Error;

/// Errors surfaced by the correlation, subscriber, resolution and dispatch layers.
///
/// `NoConnection` and `Dropped` from the live registry are deliberately absent:
/// they are normal best-effort outcomes, reported through
/// [`PushOutcome`](crate::live::PushOutcome) rather than as errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RelayError {
    /// Unknown or expired token, unknown subscriber, or unresolved identity.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The TTL store (or another backing service) could not be reached.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// A pending request already exists under this token.
    #[error("Token already in use: {0}")]
    DuplicateToken(String),

    /// The identity scan matched more than one session.
    #[error("Ambiguous identity {identity}: {candidates} sessions match")]
    AmbiguousIdentity { identity: String, candidates: usize },

    /// Caller-supplied data failed validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A stored value could not be decoded.
    #[error("Corrupt value at {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// The issuer or another upstream service rejected or failed a call.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// The terminal record could not be persisted.
    #[error("Persistence error: {0}")]
    Persistence(String),
}

/// Coarse HTTP-style classification of a [`RelayError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 4xx-equivalent: the caller can fix the request.
    Client,
    /// 5xx-equivalent: something on our side or upstream failed.
    Server,
}

impl RelayError {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        RelayError::NotFound(what.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RelayError::NotFound(_))
    }

    pub fn status_class(&self) -> StatusClass {
        match self {
            RelayError::NotFound(_)
            | RelayError::DuplicateToken(_)
            | RelayError::InvalidInput(_)
            | RelayError::AmbiguousIdentity { .. } => StatusClass::Client,
            RelayError::StoreUnavailable(_)
            | RelayError::Corrupt { .. }
            | RelayError::Upstream(_)
            | RelayError::Persistence(_) => StatusClass::Server,
        }
    }
}

impl From<StoreError> for RelayError {
    fn from(e: StoreError) -> Self {
        RelayError::StoreUnavailable(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classes() {
        assert_eq!(
            RelayError::not_found("request:x").status_class(),
            StatusClass::Client
        );
        assert_eq!(
            RelayError::AmbiguousIdentity {
                identity: "Ana Diaz".into(),
                candidates: 2
            }
            .status_class(),
            StatusClass::Client
        );
        assert_eq!(
            RelayError::from(StoreError::ActorClosed).status_class(),
            StatusClass::Server
        );
    }

    #[test]
    fn test_store_errors_become_unavailable() {
        let err: RelayError = StoreError::Backend("timeout".into()).into();
        assert_eq!(
            err,
            RelayError::StoreUnavailable("Store backend error: timeout".into())
        );
        assert!(!err.is_not_found());
    }
}
