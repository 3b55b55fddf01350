use crate::clients::namespaced::NamespacedClient;
use crate::error::RelayError;
use crate::framework::{SetMode, TtlStore};
use crate::model::PendingRequest;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Default horizon after which an uncompleted request is forgotten.
pub const DEFAULT_REQUEST_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Holds in-flight request context under `request:<token>`.
///
/// Every call is a round trip to the store. Nothing is cached locally, so a
/// restarted process sees exactly what the store holds.
#[derive(Clone)]
pub struct CorrelationStore {
    store: Arc<dyn TtlStore>,
    ttl: Duration,
}

impl NamespacedClient for CorrelationStore {
    type Record = PendingRequest;
    const NAMESPACE: &'static str = "request:";

    fn store(&self) -> &Arc<dyn TtlStore> {
        &self.store
    }
}

impl CorrelationStore {
    pub fn new(store: Arc<dyn TtlStore>) -> Self {
        Self::with_ttl(store, DEFAULT_REQUEST_TTL)
    }

    pub fn with_ttl(store: Arc<dyn TtlStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Records `pending` under a token the caller has just minted.
    ///
    /// Refuses to overwrite a live entry, so a token can never be reused while
    /// its request is in flight. `token` must equal `pending.token`.
    #[instrument(skip(self, pending))]
    pub async fn put(&self, token: &str, pending: &PendingRequest) -> Result<(), RelayError> {
        debug!(?pending, "put called");
        if pending.token != token {
            return Err(RelayError::InvalidInput(format!(
                "request token {token} does not match pending request {}",
                pending.token
            )));
        }
        let written = self
            .write(token, pending, Some(self.ttl), SetMode::IfAbsent)
            .await?;
        if !written {
            return Err(RelayError::DuplicateToken(token.to_string()));
        }
        info!(ttl_secs = self.ttl.as_secs(), "Pending request stored");
        Ok(())
    }

    /// Unknown and expired tokens both yield [`RelayError::NotFound`].
    #[instrument(skip(self))]
    pub async fn get(&self, token: &str) -> Result<PendingRequest, RelayError> {
        self.read(token)
            .await?
            .ok_or_else(|| RelayError::not_found(Self::key_for(token)))
    }

    /// Removes the entry. Returns [`RelayError::NotFound`] when nothing was
    /// there; callers completing a request treat that as success.
    #[instrument(skip(self))]
    pub async fn delete(&self, token: &str) -> Result<(), RelayError> {
        if self.remove(token).await? {
            debug!("Pending request cleared");
            Ok(())
        } else {
            Err(RelayError::not_found(Self::key_for(token)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::mock::MockStore;
    use crate::framework::{StoreActor, StoreError};
    use crate::model::IdentitySnapshot;

    fn pending(token: &str) -> PendingRequest {
        PendingRequest {
            token: token.into(),
            identity: IdentitySnapshot::new("Ana", "Diaz", "1990-04-02", "CO"),
            card_type: "credit".into(),
            session_token: Some("sess-1".into()),
        }
    }

    fn spawn_correlation() -> CorrelationStore {
        let (actor, client) = StoreActor::new(16);
        tokio::spawn(actor.run());
        CorrelationStore::new(Arc::new(client))
    }

    #[tokio::test]
    async fn test_get_unknown_token_is_not_found() {
        let store = spawn_correlation();
        let err = store.get("never-put").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = spawn_correlation();
        let p = pending("t-1");

        store.put("t-1", &p).await.unwrap();
        assert_eq!(store.get("t-1").await.unwrap(), p);

        store.delete("t-1").await.unwrap();
        assert!(store.get("t-1").await.unwrap_err().is_not_found());
        assert!(store.delete("t-1").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_duplicate_put_is_rejected() {
        let store = spawn_correlation();
        store.put("t-2", &pending("t-2")).await.unwrap();

        let mut other = pending("t-2");
        other.card_type = "debit".into();
        let err = store.put("t-2", &other).await.unwrap_err();
        assert_eq!(err, RelayError::DuplicateToken("t-2".into()));
        assert_eq!(store.get("t-2").await.unwrap().card_type, "credit");
    }

    #[tokio::test]
    async fn test_put_rejects_mismatched_token() {
        let store = spawn_correlation();
        let err = store.put("t-9", &pending("t-10")).await.unwrap_err();
        assert!(matches!(err, RelayError::InvalidInput(_)));
        assert!(store.get("t-9").await.unwrap_err().is_not_found());
        assert!(store.get("t-10").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_entry_expires_after_a_day() {
        tokio::time::pause();
        let store = spawn_correlation();
        store.put("t-3", &pending("t-3")).await.unwrap();

        tokio::time::advance(Duration::from_secs(25 * 60 * 60)).await;
        assert!(store.get("t-3").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_store_outage_and_corrupt_values() {
        let mut mock = MockStore::new();
        mock.expect_get("request:down")
            .return_err(StoreError::Backend("connection refused".into()));
        mock.expect_get("request:bad")
            .return_ok(Some("not json".into()));

        let store = CorrelationStore::new(Arc::new(mock.client()));
        assert!(matches!(
            store.get("down").await,
            Err(RelayError::StoreUnavailable(_))
        ));
        assert!(matches!(
            store.get("bad").await,
            Err(RelayError::Corrupt { key, .. }) if key == "request:bad"
        ));

        mock.verify();
    }
}
