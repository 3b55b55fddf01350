use super::dead_letter::{DeadLetter, DeadLetterLog};
use super::transport::CallbackTransport;
use crate::model::{AsyncResult, Subscriber, WebhookEvent};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, info_span, Instrument};

/// How a single webhook attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The callback answered with a 2xx status.
    Delivered { status: u16 },
    /// The callback answered, but not with a 2xx status.
    Rejected { status: u16 },
    /// The request could not be sent or no response was received.
    Failed(String),
    /// No answer within the configured timeout.
    TimedOut,
}

impl DeliveryOutcome {
    fn failure_reason(&self, limit: Duration) -> Option<String> {
        match self {
            DeliveryOutcome::Delivered { .. } => None,
            DeliveryOutcome::Rejected { status } => Some(format!("callback answered {status}")),
            DeliveryOutcome::Failed(reason) => Some(reason.clone()),
            DeliveryOutcome::TimedOut => Some(format!("no answer within {limit:?}")),
        }
    }
}

/// Fans results out to subscriber callbacks.
///
/// # Delivery Contract
/// One attempt per result, on its own task, bounded by `timeout`. There is no
/// retry and no backoff. Anything other than a 2xx answer is written to the
/// [`DeadLetterLog`] and logged at warn. The caller never observes a failure
/// unless it chooses to await the returned handle.
#[derive(Clone)]
pub struct WebhookNotifier {
    transport: Arc<dyn CallbackTransport>,
    dead_letters: DeadLetterLog,
    timeout: Duration,
    source: String,
}

impl WebhookNotifier {
    pub fn new(
        transport: Arc<dyn CallbackTransport>,
        dead_letters: DeadLetterLog,
        timeout: Duration,
        source: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            dead_letters,
            timeout,
            source: source.into(),
        }
    }

    pub fn dead_letters(&self) -> &DeadLetterLog {
        &self.dead_letters
    }

    /// Spawns the single delivery attempt for `result`.
    pub fn schedule(
        &self,
        subscriber: &Subscriber,
        result: &AsyncResult,
    ) -> JoinHandle<DeliveryOutcome> {
        let event = WebhookEvent::for_result(result, &subscriber.name, &self.source);
        let url = subscriber.callback_url.clone();
        let transport = self.transport.clone();
        let dead_letters = self.dead_letters.clone();
        let limit = self.timeout;

        let span = info_span!("webhook", event_id = %event.id, request = %result.request_token);
        tokio::spawn(
            async move {
                let attempt = transport.post_json(&url, &event);
                let outcome = match tokio::time::timeout(limit, attempt).await {
                    Ok(Ok(status)) if (200..300).contains(&status) => {
                        DeliveryOutcome::Delivered { status }
                    }
                    Ok(Ok(status)) => DeliveryOutcome::Rejected { status },
                    Ok(Err(e)) => DeliveryOutcome::Failed(e.to_string()),
                    Err(_) => DeliveryOutcome::TimedOut,
                };

                match outcome.failure_reason(limit) {
                    None => info!(%url, "Webhook delivered"),
                    Some(reason) => dead_letters.record(DeadLetter {
                        event_id: event.id.clone(),
                        callback_url: url,
                        reason,
                        failed_at: Utc::now(),
                    }),
                }
                outcome
            }
            .instrument(span),
        )
    }
}
