use super::session::LiveSession;
use crate::model::AsyncResult;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info};

/// Result of a non-blocking push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The result now sits in the connection's single slot.
    Delivered,
    /// Nobody is listening for this identity.
    NoConnection,
    /// The slot already holds an undelivered result. The new one is discarded.
    Dropped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed,
    NoConnection,
}

struct Slot {
    generation: u64,
    sender: mpsc::Sender<AsyncResult>,
}

struct RegistryInner {
    slots: RwLock<HashMap<String, Slot>>,
    next_generation: AtomicU64,
    idle_timeout: Option<Duration>,
}

/// In-process map from identity (session token) to a single-slot channel.
///
/// # Concurrency Model
/// One `RwLock` guards the map. `open`, `push`, `close` and `release` take the
/// write lock, existence checks take the read lock. No lock is ever held across
/// an `.await` or any I/O, so hold times stay constant.
///
/// # Delivery Policy
/// At most one outstanding result per identity, at most once, best effort.
/// Producers never block: a missing connection and a full slot are reported as
/// [`PushOutcome`] values, not errors. Reopening an identity replaces the old
/// connection and whatever it had buffered is lost.
///
/// The registry is a cheap handle. Clones share the same map.
#[derive(Clone)]
pub struct LiveRegistry {
    inner: Arc<RegistryInner>,
}

impl LiveRegistry {
    /// `idle_timeout = None` lets sessions wait indefinitely.
    pub fn new(idle_timeout: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                slots: RwLock::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
                idle_timeout,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Slot>> {
        self.inner
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Slot>> {
        self.inner
            .slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens a connection for `identity`, closing any prior one first.
    pub fn open(&self, identity: &str) -> LiveSession {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(1);

        let replaced = self
            .write()
            .insert(identity.to_string(), Slot { generation, sender })
            .is_some();

        if replaced {
            info!(%identity, generation, "Live connection replaced");
        } else {
            debug!(%identity, generation, "Live connection opened");
        }

        LiveSession::new(
            identity.to_string(),
            generation,
            receiver,
            self.clone(),
            self.inner.idle_timeout,
        )
    }

    /// Offers `result` to the identity's connection without waiting.
    pub fn push(&self, identity: &str, result: AsyncResult) -> PushOutcome {
        let outcome = {
            let mut slots = self.write();
            let sent = slots
                .get(identity)
                .map(|slot| slot.sender.try_send(result));
            match sent {
                None => PushOutcome::NoConnection,
                Some(Ok(())) => PushOutcome::Delivered,
                Some(Err(TrySendError::Full(_))) => PushOutcome::Dropped,
                Some(Err(TrySendError::Closed(_))) => {
                    slots.remove(identity);
                    PushOutcome::NoConnection
                }
            }
        };

        match outcome {
            PushOutcome::Delivered => debug!(%identity, "Pushed result"),
            PushOutcome::NoConnection => debug!(%identity, "No live connection"),
            PushOutcome::Dropped => info!(%identity, "Slot occupied, result dropped"),
        }
        outcome
    }

    /// Removes the connection. Its listener unblocks with [`SessionOutcome::Closed`].
    ///
    /// [`SessionOutcome::Closed`]: super::SessionOutcome::Closed
    pub fn close(&self, identity: &str) -> CloseOutcome {
        match self.write().remove(identity) {
            Some(_) => {
                debug!(%identity, "Live connection closed");
                CloseOutcome::Closed
            }
            None => CloseOutcome::NoConnection,
        }
    }

    pub fn is_connected(&self, identity: &str) -> bool {
        self.read().contains_key(identity)
    }

    pub fn connection_count(&self) -> usize {
        self.read().len()
    }

    /// Closes every connection. Returns how many were open.
    pub fn shutdown(&self) -> usize {
        let count = {
            let mut slots = self.write();
            let count = slots.len();
            slots.clear();
            count
        };
        info!(count, "Live registry shut down");
        count
    }

    pub(crate) fn is_current(&self, identity: &str, generation: u64) -> bool {
        self.read()
            .get(identity)
            .is_some_and(|slot| slot.generation == generation)
    }

    /// True when a newer connection than `generation` holds the identity.
    pub(crate) fn is_superseded(&self, identity: &str, generation: u64) -> bool {
        self.read()
            .get(identity)
            .is_some_and(|slot| slot.generation != generation)
    }

    /// Removes the entry only if it still belongs to `generation`.
    pub(crate) fn release(&self, identity: &str, generation: u64) {
        let mut slots = self.write();
        if slots
            .get(identity)
            .is_some_and(|slot| slot.generation == generation)
        {
            slots.remove(identity);
            debug!(%identity, generation, "Live connection released");
        }
    }
}
