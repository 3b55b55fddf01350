//! # Core TTL Store
//!
//! This module defines the ephemeral key-value substrate the relay keeps its
//! in-flight state in.
//!
//! ## Key Types
//!
//! - [`TtlStore`]: The async contract any backing store must satisfy.
//! - [`StoreActor`]: An in-process store that owns its map inside a Tokio task.
//! - [`StoreClient`]: The cloneable handle that talks to a running `StoreActor`.
//! - [`StoreError`]: Transport-level failures (actor gone, reply dropped, backend down).

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, trace};

// =============================================================================
// 1. THE ABSTRACTION
// =============================================================================

/// How a `set` treats a key that already holds a live value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMode {
    /// Replace whatever is there.
    Overwrite,
    /// Write only when the key is absent or expired (Redis `SET NX`).
    IfAbsent,
}

/// Contract for the ephemeral store that backs correlation, subscriber and
/// session state.
///
/// # Architecture Note
/// The relay never talks to a concrete store. The in-process [`StoreActor`] is
/// what the crate ships, but a networked store (Redis, Memcached, ...) plugs in by
/// implementing this trait. Expired keys must be indistinguishable from keys that
/// were never written.
#[async_trait]
pub trait TtlStore: Send + Sync {
    /// Writes `value` under `key`. `ttl = None` means the key never expires.
    ///
    /// Returns `false` only when `mode` is [`SetMode::IfAbsent`] and a live value
    /// already exists.
    async fn set(
        &self,
        key: String,
        value: String,
        ttl: Option<Duration>,
        mode: SetMode,
    ) -> Result<bool, StoreError>;

    /// Reads a live value.
    async fn get(&self, key: String) -> Result<Option<String>, StoreError>;

    /// Removes a key. Returns whether a live value was removed.
    async fn delete(&self, key: String) -> Result<bool, StoreError>;

    /// Lists live keys starting with `prefix`, in no particular order.
    async fn keys(&self, prefix: String) -> Result<Vec<String>, StoreError>;
}

// =============================================================================
// 2. THE MESSAGES & ERRORS
// =============================================================================

/// Errors raised by the store transport itself.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum StoreError {
    #[error("Store actor closed")]
    ActorClosed,
    #[error("Store actor dropped response channel")]
    ActorDropped,
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Type alias for the one-shot response channel used by the store actor.
pub type Response<T> = oneshot::Sender<Result<T, StoreError>>;

/// Internal message type sent to the [`StoreActor`].
///
/// The variants map one-to-one onto the [`TtlStore`] operations, plus an explicit
/// `Shutdown` so the owner can stop the actor even while clones of the client are
/// still held by long-lived components.
#[derive(Debug)]
pub enum StoreRequest {
    Set {
        key: String,
        value: String,
        ttl: Option<Duration>,
        mode: SetMode,
        respond_to: Response<bool>,
    },
    Get {
        key: String,
        respond_to: Response<Option<String>>,
    },
    Delete {
        key: String,
        respond_to: Response<bool>,
    },
    Keys {
        prefix: String,
        respond_to: Response<Vec<String>>,
    },
    Shutdown {
        respond_to: oneshot::Sender<()>,
    },
}

// =============================================================================
// 3. THE STORE ACTOR
// =============================================================================

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(at) => at > now,
            None => true,
        }
    }
}

/// In-process TTL store.
///
/// # Concurrency Model
/// The actor owns the map and processes requests one at a time, so every single
/// operation is atomic without any lock. Sequences of operations issued by a
/// caller are *not* atomic: another task can interleave between a `get` and the
/// following `delete`.
///
/// # Expiry
/// Deadlines use [`tokio::time::Instant`], so tests can drive expiry with a paused
/// clock. Every read checks the deadline, and a periodic sweep drops expired
/// entries so that keys nobody reads again do not accumulate.
pub struct StoreActor {
    receiver: mpsc::Receiver<StoreRequest>,
    entries: HashMap<String, Entry>,
    sweep_every: Duration,
}

impl StoreActor {
    /// Creates a new `StoreActor` and its associated `StoreClient`.
    ///
    /// # Arguments
    ///
    /// * `buffer_size` - The capacity of the MPSC channel. If the channel is full,
    ///   calls on the client wait until there is space.
    pub fn new(buffer_size: usize) -> (Self, StoreClient) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let actor = Self {
            receiver,
            entries: HashMap::new(),
            sweep_every: Duration::from_secs(60),
        };
        (actor, StoreClient::new(sender))
    }

    /// Overrides how often expired entries are swept.
    pub fn with_sweep_interval(mut self, every: Duration) -> Self {
        self.sweep_every = every;
        self
    }

    /// Runs the actor's event loop until every client is dropped or a
    /// `Shutdown` request arrives.
    pub async fn run(mut self) {
        info!(sweep_secs = self.sweep_every.as_secs(), "Store started");
        let mut sweep = tokio::time::interval(self.sweep_every);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                msg = self.receiver.recv() => {
                    let Some(msg) = msg else { break };
                    if let StoreRequest::Shutdown { respond_to } = msg {
                        let _ = respond_to.send(());
                        break;
                    }
                    self.handle(msg);
                }
                _ = sweep.tick() => self.sweep(),
            }
        }

        info!(size = self.entries.len(), "Store shutdown");
    }

    fn handle(&mut self, msg: StoreRequest) {
        let now = Instant::now();
        match msg {
            StoreRequest::Set {
                key,
                value,
                ttl,
                mode,
                respond_to,
            } => {
                let occupied = self.entries.get(&key).is_some_and(|e| e.is_live(now));
                if mode == SetMode::IfAbsent && occupied {
                    debug!(%key, "Set skipped, key is live");
                    let _ = respond_to.send(Ok(false));
                    return;
                }
                let expires_at = ttl.map(|ttl| now + ttl);
                self.entries.insert(key.clone(), Entry { value, expires_at });
                debug!(%key, ?ttl, size = self.entries.len(), "Set");
                let _ = respond_to.send(Ok(true));
            }
            StoreRequest::Get { key, respond_to } => {
                let value = self.live_value(&key, now);
                trace!(%key, found = value.is_some(), "Get");
                let _ = respond_to.send(Ok(value));
            }
            StoreRequest::Delete { key, respond_to } => {
                let removed = self
                    .entries
                    .remove(&key)
                    .is_some_and(|entry| entry.is_live(now));
                debug!(%key, removed, size = self.entries.len(), "Delete");
                let _ = respond_to.send(Ok(removed));
            }
            StoreRequest::Keys { prefix, respond_to } => {
                let keys: Vec<String> = self
                    .entries
                    .iter()
                    .filter(|(key, entry)| key.starts_with(&prefix) && entry.is_live(now))
                    .map(|(key, _)| key.clone())
                    .collect();
                debug!(%prefix, count = keys.len(), "Keys");
                let _ = respond_to.send(Ok(keys));
            }
            StoreRequest::Shutdown { respond_to } => {
                let _ = respond_to.send(());
            }
        }
    }

    fn live_value(&mut self, key: &str, now: Instant) -> Option<String> {
        match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn sweep(&mut self) {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        let evicted = before - self.entries.len();
        if evicted > 0 {
            debug!(evicted, size = self.entries.len(), "Swept expired keys");
        }
    }
}

// =============================================================================
// 4. THE CLIENT
// =============================================================================

/// A cloneable handle for a running [`StoreActor`].
#[derive(Clone, Debug)]
pub struct StoreClient {
    sender: mpsc::Sender<StoreRequest>,
}

impl StoreClient {
    pub fn new(sender: mpsc::Sender<StoreRequest>) -> Self {
        Self { sender }
    }

    /// Asks the actor to stop. Later calls on any clone fail with
    /// [`StoreError::ActorClosed`].
    pub async fn shutdown(&self) {
        let (respond_to, response) = oneshot::channel();
        if self
            .sender
            .send(StoreRequest::Shutdown { respond_to })
            .await
            .is_ok()
        {
            let _ = response.await;
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Response<T>) -> StoreRequest,
    ) -> Result<T, StoreError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(build(respond_to))
            .await
            .map_err(|_| StoreError::ActorClosed)?;
        response.await.map_err(|_| StoreError::ActorDropped)?
    }
}

#[async_trait]
impl TtlStore for StoreClient {
    async fn set(
        &self,
        key: String,
        value: String,
        ttl: Option<Duration>,
        mode: SetMode,
    ) -> Result<bool, StoreError> {
        self.request(|respond_to| StoreRequest::Set {
            key,
            value,
            ttl,
            mode,
            respond_to,
        })
        .await
    }

    async fn get(&self, key: String) -> Result<Option<String>, StoreError> {
        self.request(|respond_to| StoreRequest::Get { key, respond_to })
            .await
    }

    async fn delete(&self, key: String) -> Result<bool, StoreError> {
        self.request(|respond_to| StoreRequest::Delete { key, respond_to })
            .await
    }

    async fn keys(&self, prefix: String) -> Result<Vec<String>, StoreError> {
        self.request(|respond_to| StoreRequest::Keys { prefix, respond_to })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_store() -> StoreClient {
        let (actor, client) = StoreActor::new(16);
        tokio::spawn(actor.run());
        client
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = spawn_store();

        let written = store
            .set("request:a".into(), "payload".into(), None, SetMode::Overwrite)
            .await
            .unwrap();
        assert!(written);

        let value = store.get("request:a".into()).await.unwrap();
        assert_eq!(value.as_deref(), Some("payload"));

        assert!(store.delete("request:a".into()).await.unwrap());
        assert!(!store.delete("request:a".into()).await.unwrap());
        assert_eq!(store.get("request:a".into()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_if_absent_refuses_live_key() {
        let store = spawn_store();

        assert!(store
            .set("k".into(), "first".into(), None, SetMode::IfAbsent)
            .await
            .unwrap());
        assert!(!store
            .set("k".into(), "second".into(), None, SetMode::IfAbsent)
            .await
            .unwrap());

        let value = store.get("k".into()).await.unwrap();
        assert_eq!(value.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_keys_filters_by_prefix() {
        let store = spawn_store();
        for key in ["session:1", "session:2", "request:1"] {
            store
                .set(key.into(), "{}".into(), None, SetMode::Overwrite)
                .await
                .unwrap();
        }

        let mut keys = store.keys("session:".into()).await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["session:1", "session:2"]);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        tokio::time::pause();
        let store = spawn_store();

        store
            .set(
                "request:t".into(),
                "v".into(),
                Some(Duration::from_secs(10)),
                SetMode::IfAbsent,
            )
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(store.get("request:t".into()).await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.get("request:t".into()).await.unwrap(), None);
        assert!(store.keys("request:".into()).await.unwrap().is_empty());

        // An expired key no longer blocks IfAbsent writes.
        assert!(store
            .set("request:t".into(), "v2".into(), None, SetMode::IfAbsent)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_shutdown_closes_every_clone() {
        let (actor, store) = StoreActor::new(4);
        let handle = tokio::spawn(actor.run());
        let other = store.clone();

        store.shutdown().await;
        handle.await.unwrap();

        let err = other.get("anything".into()).await.unwrap_err();
        assert_eq!(err, StoreError::ActorClosed);
    }
}
