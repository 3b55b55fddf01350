use super::registry::LiveRegistry;
use crate::model::AsyncResult;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument};

/// How a waiting session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Delivered(AsyncResult),
    /// The client went away first.
    Disconnected,
    /// A newer connection for the same identity took over.
    Replaced,
    /// The registry closed the connection.
    Closed,
    /// Nothing arrived within the idle timeout.
    TimedOut,
}

/// The consumer side of one live connection.
///
/// Dropping the session releases its registry entry, but only while the entry
/// still belongs to this session.
pub struct LiveSession {
    identity: String,
    generation: u64,
    receiver: mpsc::Receiver<AsyncResult>,
    registry: LiveRegistry,
    idle_timeout: Option<Duration>,
}

impl LiveSession {
    pub(crate) fn new(
        identity: String,
        generation: u64,
        receiver: mpsc::Receiver<AsyncResult>,
        registry: LiveRegistry,
        idle_timeout: Option<Duration>,
    ) -> Self {
        Self {
            identity,
            generation,
            receiver,
            registry,
            idle_timeout,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Waits for a result, the `disconnected` signal, or the idle timeout,
    /// whichever comes first.
    ///
    /// A result still buffered after the session was replaced or closed is
    /// discarded. On delivery the registry entry is released before returning.
    #[instrument(skip_all, fields(identity = %self.identity, generation = self.generation))]
    pub async fn wait(mut self, disconnected: impl Future<Output = ()>) -> SessionOutcome {
        tokio::pin!(disconnected);
        let idle_timeout = self.idle_timeout;
        let idle = async move {
            match idle_timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(idle);

        let outcome = tokio::select! {
            received = self.receiver.recv() => match received {
                Some(result) if self.registry.is_current(&self.identity, self.generation) => {
                    SessionOutcome::Delivered(result)
                }
                _ => self.ended_by(),
            },
            _ = &mut disconnected => SessionOutcome::Disconnected,
            _ = &mut idle => SessionOutcome::TimedOut,
        };

        if matches!(outcome, SessionOutcome::Delivered(_)) {
            self.finish_delivery();
        }
        debug!(outcome = outcome_name(&outcome), "Live session ended");
        outcome
    }

    /// Gives up the registry entry right after taking a result, so later pushes
    /// see `NoConnection` instead of landing in a slot nobody reads.
    fn finish_delivery(&mut self) {
        self.registry.release(&self.identity, self.generation);
        self.receiver.close();
        if let Ok(late) = self.receiver.try_recv() {
            info!(request = %late.request_token, "Result pushed after delivery, dropped");
        }
    }

    fn ended_by(&self) -> SessionOutcome {
        if self.registry.is_superseded(&self.identity, self.generation) {
            SessionOutcome::Replaced
        } else {
            SessionOutcome::Closed
        }
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.registry.release(&self.identity, self.generation);
    }
}

fn outcome_name(outcome: &SessionOutcome) -> &'static str {
    match outcome {
        SessionOutcome::Delivered(_) => "delivered",
        SessionOutcome::Disconnected => "disconnected",
        SessionOutcome::Replaced => "replaced",
        SessionOutcome::Closed => "closed",
        SessionOutcome::TimedOut => "timed_out",
    }
}
