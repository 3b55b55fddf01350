use crate::clients::{CorrelationStore, SessionDirectory, SubscriberRegistry};
use crate::config::RelayConfig;
use crate::dispatcher::ResultDispatcher;
use crate::framework::{StoreActor, StoreClient, TtlStore};
use crate::issuance::{IssuanceService, IssuerGateway};
use crate::live::LiveRegistry;
use crate::records::RecordStore;
use crate::resolver::IdentityResolver;
use crate::webhook::{CallbackTransport, DeadLetterLog, WebhookNotifier};
use std::sync::Arc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info};

/// The runtime orchestrator for the card relay.
///
/// `RelaySystem` is responsible for:
/// - **Lifecycle Management**: Starting the store actor and stopping everything on shutdown
/// - **Dependency Wiring**: Handing every component the collaborators it needs
/// - **Ownership**: Holding the one [`LiveRegistry`] of the process, so nothing
///   reaches for a global
///
/// # Architecture
///
/// - **Store actor**: In-process TTL store backing sessions, subscribers and pending requests
/// - **Issuance**: Front half of the flow, from card request to issuer submission
/// - **Dispatcher**: Back half, from issuer result to record, live push and webhook
///
/// # Example
///
/// ```ignore
/// let system = RelaySystem::new(&config, transport, gateway, records);
///
/// let session = system.sessions.register(&record).await?;
/// let request = system.issuance.request_card(&session, "credit").await?;
/// // ... the issuer answers ...
/// let report = system.dispatcher.dispatch(result).await?;
///
/// system.shutdown().await?;
/// ```
pub struct RelaySystem {
    pub sessions: SessionDirectory,
    pub subscribers: SubscriberRegistry,
    pub correlation: CorrelationStore,
    pub live: LiveRegistry,
    pub issuance: IssuanceService,
    pub dispatcher: ResultDispatcher,
    notifier: WebhookNotifier,
    store: StoreClient,
    handles: Vec<JoinHandle<()>>,
}

impl RelaySystem {
    /// Creates and starts a new `RelaySystem`.
    ///
    /// This method:
    /// 1. Spawns the store actor
    /// 2. Builds the namespaced clients over it
    /// 3. Wires the resolver, notifier, issuance service and dispatcher
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        config: &RelayConfig,
        transport: Arc<dyn CallbackTransport>,
        gateway: Arc<dyn IssuerGateway>,
        records: Arc<dyn RecordStore>,
    ) -> Self {
        // 1. Start the store
        let (actor, store) = StoreActor::new(config.store_buffer);
        let actor = actor.with_sweep_interval(config.store_sweep_interval);
        let store_handle = tokio::spawn(actor.run());
        let shared: Arc<dyn TtlStore> = Arc::new(store.clone());

        // 2. Namespaced clients
        let sessions = SessionDirectory::with_ttl(shared.clone(), config.session_ttl);
        let subscribers = SubscriberRegistry::new(shared.clone(), config.subscriber_ttl);
        let correlation = CorrelationStore::with_ttl(shared, config.request_ttl);

        // 3. Services
        let live = LiveRegistry::new(config.live_idle_timeout);
        let notifier = WebhookNotifier::new(
            transport,
            DeadLetterLog::new(config.dead_letter_capacity),
            config.webhook_timeout,
            config.event_source.clone(),
        );
        let resolver = IdentityResolver::new(sessions.clone(), config.identity_scan_fallback);
        let issuance = IssuanceService::new(
            sessions.clone(),
            correlation.clone(),
            gateway,
            config.subscriber_token.clone(),
        );
        let dispatcher = ResultDispatcher::new(
            correlation.clone(),
            subscribers.clone(),
            resolver,
            records,
            live.clone(),
            notifier.clone(),
        );

        info!(
            scan_fallback = config.identity_scan_fallback,
            idle_timeout = ?config.live_idle_timeout,
            "Relay system started"
        );

        Self {
            sessions,
            subscribers,
            correlation,
            live,
            issuance,
            dispatcher,
            notifier,
            store,
            handles: vec![store_handle],
        }
    }

    /// Failed webhook deliveries, oldest first.
    pub fn dead_letters(&self) -> &DeadLetterLog {
        self.notifier.dead_letters()
    }

    /// Gracefully shuts down the entire system.
    ///
    /// This method:
    /// 1. Closes every live connection so waiting clients unblock
    /// 2. Stops the store actor, even though clones of its client are still held
    /// 3. Waits for the actor task and reports a panic if there was one
    pub async fn shutdown(self) -> Result<(), JoinError> {
        info!("Shutting down relay...");

        // =====================================================================
        // Step 1: Release live listeners
        // =====================================================================
        self.live.shutdown();

        // =====================================================================
        // Step 2: Stop the store
        // =====================================================================
        // Other components hold clones of the client. Calls through them fail
        // with StoreUnavailable from here on.
        self.store.shutdown().await;

        // =====================================================================
        // Step 3: Wait for background tasks
        // =====================================================================
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Relay task failed: {:?}", e);
                return Err(e);
            }
        }

        info!("Relay shutdown complete.");
        Ok(())
    }
}
