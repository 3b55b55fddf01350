//! # Result Dispatcher
//!
//! Turns an [`AsyncResult`] from the issuer into a durable record, at most one
//! real-time push and an optional webhook.
//!
//! ## Sequence
//!
//! 1. Look up the pending request. Unknown or expired tokens are rejected with
//!    no side effects at all.
//! 2. Resolve the owning session. On failure the pending entry is left in place
//!    so a later retry (or expiry) can deal with it.
//! 3. Persist the terminal record. A failure here is reported, not returned.
//! 4. Delete the pending entry, whatever step 3 did.
//! 5. Push to the live registry and, if the result names a subscriber, spawn
//!    the webhook. Neither can undo steps 3 and 4.
//!
//! Two copies of the same result racing through `dispatch` can both pass
//! step 1 before either reaches step 4, so duplicates may be persisted twice.
//! The store's delete is atomic, though: only the dispatch whose delete removed
//! the entry fans out to the subscriber, so a callback is POSTed at most once
//! per request. A delete that fails outright does not claim anything and the
//! webhook still goes out.

use crate::clients::{CorrelationStore, SubscriberRegistry};
use crate::error::RelayError;
use crate::live::{LiveRegistry, PushOutcome};
use crate::model::{AsyncResult, Outcome, TerminalRecord};
use crate::records::RecordStore;
use crate::resolver::{IdentityResolver, Resolution};
use crate::webhook::{DeliveryOutcome, WebhookNotifier};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// What happened to the webhook side of a dispatch.
#[derive(Debug)]
pub enum WebhookDisposition {
    /// The result carried no subscriber token.
    NotRequested,
    /// A delivery attempt is running. Awaiting the handle is optional.
    Scheduled(JoinHandle<DeliveryOutcome>),
    /// The subscriber token did not resolve.
    SubscriberUnknown,
    /// The subscriber lookup itself failed.
    Unavailable(RelayError),
    /// The pending entry was already gone at cleanup, so another dispatch of
    /// the same result owns the webhook.
    AlreadyClaimed,
}

/// Everything a dispatch did, for the caller to log or answer with.
#[derive(Debug)]
pub struct DispatchReport {
    pub request_token: String,
    /// Session token of the owning end user.
    pub identity: String,
    pub resolution: Resolution,
    pub persistence: Result<(), RelayError>,
    /// Whether the pending entry is known to be gone.
    pub cleaned_up: bool,
    pub live: PushOutcome,
    pub webhook: WebhookDisposition,
}

#[derive(Clone)]
pub struct ResultDispatcher {
    correlation: CorrelationStore,
    subscribers: SubscriberRegistry,
    resolver: IdentityResolver,
    records: Arc<dyn RecordStore>,
    live: LiveRegistry,
    notifier: WebhookNotifier,
}

impl ResultDispatcher {
    pub fn new(
        correlation: CorrelationStore,
        subscribers: SubscriberRegistry,
        resolver: IdentityResolver,
        records: Arc<dyn RecordStore>,
        live: LiveRegistry,
        notifier: WebhookNotifier,
    ) -> Self {
        Self {
            correlation,
            subscribers,
            resolver,
            records,
            live,
            notifier,
        }
    }

    #[instrument(
        skip_all,
        fields(request = %result.request_token, status = result.outcome.status())
    )]
    pub async fn dispatch(&self, result: AsyncResult) -> Result<DispatchReport, RelayError> {
        debug!(?result, "dispatch called");

        let pending = match self.correlation.get(&result.request_token).await {
            Ok(pending) => pending,
            Err(e) => {
                info!(error = %e, "Rejecting result");
                return Err(e);
            }
        };

        let (identity, resolution) = self.resolver.resolve(&result, &pending).await?;
        let result = with_card_type(result, &pending.card_type);

        let record = TerminalRecord::from_result(&identity, &pending.card_type, &result);
        let persistence = self.records.persist(record).await;
        if let Err(e) = &persistence {
            warn!(error = %e, %identity, "Terminal record not persisted");
        }

        let (cleaned_up, claimed) = match self.correlation.delete(&result.request_token).await {
            Ok(()) => (true, true),
            Err(e) if e.is_not_found() => {
                info!("Pending request already cleared by another dispatch");
                (true, false)
            }
            Err(e) => {
                warn!(error = %e, "Pending request not cleared");
                (false, true)
            }
        };

        let live = self.live.push(&identity, result.clone());
        let webhook = if claimed {
            self.fan_out(&result).await
        } else if result.subscriber_token.is_some() {
            WebhookDisposition::AlreadyClaimed
        } else {
            WebhookDisposition::NotRequested
        };

        info!(%identity, ?resolution, ?live, cleaned_up, "Result dispatched");
        Ok(DispatchReport {
            request_token: result.request_token,
            identity,
            resolution,
            persistence,
            cleaned_up,
            live,
            webhook,
        })
    }

    async fn fan_out(&self, result: &AsyncResult) -> WebhookDisposition {
        let Some(token) = result.subscriber_token.as_deref() else {
            return WebhookDisposition::NotRequested;
        };
        match self.subscribers.resolve(token).await {
            Ok(subscriber) => {
                WebhookDisposition::Scheduled(self.notifier.schedule(&subscriber, result))
            }
            Err(e) if e.is_not_found() => {
                info!("Unknown subscriber, webhook skipped");
                WebhookDisposition::SubscriberUnknown
            }
            Err(e) => {
                warn!(error = %e, "Subscriber lookup failed, webhook skipped");
                WebhookDisposition::Unavailable(e)
            }
        }
    }
}

/// Issuers may leave the card type off an issued card; fill it from the request.
fn with_card_type(mut result: AsyncResult, card_type: &str) -> AsyncResult {
    if let Outcome::Issued(card) = &mut result.outcome {
        if card.card_type.is_empty() {
            card.card_type = card_type.to_string();
        }
    }
    result
}
