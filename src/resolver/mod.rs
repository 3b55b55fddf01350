//! # Reverse Identity Resolver
//!
//! Recovers the session that owns a completed request.
//!
//! The session token normally travels with the request: it is stored on the
//! [`PendingRequest`] and the issuer echoes it back on the [`AsyncResult`].
//! Only when neither carries it does the resolver fall back to scanning every
//! session and comparing `(name, lastname)`. The scan is O(sessions) and the
//! pair is not unique, so it can be switched off, and more than one match is
//! reported as [`RelayError::AmbiguousIdentity`] instead of guessing.

use crate::clients::SessionDirectory;
use crate::error::RelayError;
use crate::model::{AsyncResult, PendingRequest};
use tracing::{info, instrument, warn};

/// How an identity was recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The session token was carried by the result or the pending request.
    Direct,
    /// The session token was found by scanning sessions for a name match.
    Scanned,
}

#[derive(Clone)]
pub struct IdentityResolver {
    sessions: SessionDirectory,
    scan_fallback: bool,
}

impl IdentityResolver {
    pub fn new(sessions: SessionDirectory, scan_fallback: bool) -> Self {
        Self {
            sessions,
            scan_fallback,
        }
    }

    /// Returns the owning session token and how it was found.
    #[instrument(skip_all, fields(request = %pending.token))]
    pub async fn resolve(
        &self,
        result: &AsyncResult,
        pending: &PendingRequest,
    ) -> Result<(String, Resolution), RelayError> {
        let direct = result
            .session_token
            .as_ref()
            .or(pending.session_token.as_ref());
        if let Some(token) = direct {
            return Ok((token.clone(), Resolution::Direct));
        }

        if !self.scan_fallback {
            return Err(RelayError::not_found(format!(
                "session for request {} (no session token, scan disabled)",
                pending.token
            )));
        }

        warn!("No session token on request, scanning sessions");
        let matches: Vec<String> = self
            .sessions
            .scan()
            .await?
            .into_iter()
            .filter(|(_, session)| session.identity.same_person(&pending.identity))
            .map(|(token, _)| token)
            .collect();

        match matches.as_slice() {
            [token] => {
                info!("Identity recovered by scan");
                Ok((token.clone(), Resolution::Scanned))
            }
            [] => Err(RelayError::not_found(format!(
                "session matching {}",
                pending.identity.full_name()
            ))),
            _ => Err(RelayError::AmbiguousIdentity {
                identity: pending.identity.full_name(),
                candidates: matches.len(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::StoreActor;
    use crate::model::{IdentitySnapshot, SessionRecord};
    use std::sync::Arc;

    fn spawn_sessions() -> SessionDirectory {
        let (actor, client) = StoreActor::new(16);
        tokio::spawn(actor.run());
        SessionDirectory::new(Arc::new(client))
    }

    fn ana() -> IdentitySnapshot {
        IdentitySnapshot::new("Ana", "Diaz", "1990-04-02", "CO")
    }

    fn pending(session_token: Option<&str>) -> PendingRequest {
        PendingRequest {
            token: "req-1".into(),
            identity: ana(),
            card_type: "credit".into(),
            session_token: session_token.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_echoed_session_token_wins() {
        let resolver = IdentityResolver::new(spawn_sessions(), true);
        let result = AsyncResult::declined("req-1", "age").with_session("from-result");

        let resolved = resolver
            .resolve(&result, &pending(Some("from-pending")))
            .await
            .unwrap();
        assert_eq!(resolved, ("from-result".to_string(), Resolution::Direct));

        let resolved = resolver
            .resolve(&AsyncResult::declined("req-1", "age"), &pending(Some("from-pending")))
            .await
            .unwrap();
        assert_eq!(resolved, ("from-pending".to_string(), Resolution::Direct));
    }

    #[tokio::test]
    async fn test_scan_finds_single_match() {
        let sessions = spawn_sessions();
        let token = sessions
            .register(&SessionRecord::new(ana(), "1001"))
            .await
            .unwrap();
        sessions
            .register(&SessionRecord::new(
                IdentitySnapshot::new("Luis", "Diaz", "1985-01-01", "CO"),
                "1002",
            ))
            .await
            .unwrap();

        let resolver = IdentityResolver::new(sessions, true);
        let resolved = resolver
            .resolve(&AsyncResult::declined("req-1", "age"), &pending(None))
            .await
            .unwrap();
        assert_eq!(resolved, (token, Resolution::Scanned));
    }

    #[tokio::test]
    async fn test_scan_reports_ambiguity_and_absence() {
        let sessions = spawn_sessions();
        let resolver = IdentityResolver::new(sessions.clone(), true);
        let result = AsyncResult::declined("req-1", "age");

        let err = resolver.resolve(&result, &pending(None)).await.unwrap_err();
        assert!(err.is_not_found());

        sessions.register(&SessionRecord::new(ana(), "1")).await.unwrap();
        sessions.register(&SessionRecord::new(ana(), "2")).await.unwrap();
        let err = resolver.resolve(&result, &pending(None)).await.unwrap_err();
        assert_eq!(
            err,
            RelayError::AmbiguousIdentity {
                identity: "Ana Diaz".into(),
                candidates: 2
            }
        );
    }

    #[tokio::test]
    async fn test_disabled_scan_is_not_found() {
        let sessions = spawn_sessions();
        sessions.register(&SessionRecord::new(ana(), "1")).await.unwrap();

        let resolver = IdentityResolver::new(sessions, false);
        let err = resolver
            .resolve(&AsyncResult::declined("req-1", "age"), &pending(None))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
