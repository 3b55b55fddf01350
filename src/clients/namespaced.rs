use crate::error::RelayError;
use crate::framework::{SetMode, TtlStore};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Trait for clients that own one key namespace of the TTL store.
///
/// This trait reduces boilerplate by providing default implementations for
/// JSON encoding, key prefixing and error mapping. Implementors only name their
/// namespace and hand out the store.
#[async_trait]
pub trait NamespacedClient: Send + Sync {
    /// The record stored under each key.
    type Record: Serialize + DeserializeOwned + Send + Sync;

    /// Key prefix including the trailing colon, e.g. `"request:"`.
    const NAMESPACE: &'static str;

    /// Access the underlying store.
    fn store(&self) -> &Arc<dyn TtlStore>;

    fn key_for(token: &str) -> String {
        format!("{}{}", Self::NAMESPACE, token)
    }

    /// Strips the namespace from a key returned by a prefix scan.
    fn token_of(key: &str) -> Option<&str> {
        key.strip_prefix(Self::NAMESPACE)
    }

    /// Encode and write a record. Returns `false` when `mode` is
    /// [`SetMode::IfAbsent`] and the key is live.
    #[tracing::instrument(skip(self, record))]
    async fn write(
        &self,
        token: &str,
        record: &Self::Record,
        ttl: Option<Duration>,
        mode: SetMode,
    ) -> Result<bool, RelayError> {
        tracing::debug!(ns = Self::NAMESPACE, "Sending request");
        let value = serde_json::to_string(record).map_err(|e| RelayError::Corrupt {
            key: Self::key_for(token),
            reason: e.to_string(),
        })?;
        Ok(self
            .store()
            .set(Self::key_for(token), value, ttl, mode)
            .await?)
    }

    /// Fetch and decode a record. `Ok(None)` covers unknown and expired alike.
    #[tracing::instrument(skip(self))]
    async fn read(&self, token: &str) -> Result<Option<Self::Record>, RelayError> {
        tracing::debug!(ns = Self::NAMESPACE, "Sending request");
        let key = Self::key_for(token);
        let Some(raw) = self.store().get(key.clone()).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| RelayError::Corrupt {
                key,
                reason: e.to_string(),
            })
    }

    /// Delete a record. Returns whether a live value was removed.
    #[tracing::instrument(skip(self))]
    async fn remove(&self, token: &str) -> Result<bool, RelayError> {
        tracing::debug!(ns = Self::NAMESPACE, "Sending request");
        Ok(self.store().delete(Self::key_for(token)).await?)
    }
}
