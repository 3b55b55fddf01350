//! The front half of the flow: turning a card request into a pending entry and
//! a call to the issuer.

use crate::clients::{CorrelationStore, SessionDirectory};
use crate::error::RelayError;
use crate::model::{IssueRequest, PendingRequest};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

/// Hands an [`IssueRequest`] to whoever decides on it. The decision itself
/// comes back later as an [`AsyncResult`](crate::model::AsyncResult).
#[async_trait]
pub trait IssuerGateway: Send + Sync {
    async fn submit(&self, request: &IssueRequest) -> Result<(), RelayError>;
}

pub const DEFAULT_ISSUER_TIMEOUT: Duration = Duration::from_secs(10);

/// POSTs requests to an HTTP issuer. Any non-2xx answer, and no answer within
/// the timeout, is an upstream error.
#[derive(Clone)]
pub struct HttpIssuerGateway {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpIssuerGateway {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            timeout: DEFAULT_ISSUER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl IssuerGateway for HttpIssuerGateway {
    async fn submit(&self, request: &IssueRequest) -> Result<(), RelayError> {
        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RelayError::Upstream(format!("issuer gave no answer within {:?}", self.timeout))
                } else {
                    RelayError::Upstream(format!("issuer unreachable: {e}"))
                }
            })?;

        if !response.status().is_success() {
            return Err(RelayError::Upstream(format!(
                "issuer answered {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Queues requests for an issuer running in the same process.
#[derive(Clone)]
pub struct ChannelGateway {
    sender: mpsc::Sender<IssueRequest>,
}

impl ChannelGateway {
    pub fn new(buffer_size: usize) -> (Self, mpsc::Receiver<IssueRequest>) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl IssuerGateway for ChannelGateway {
    async fn submit(&self, request: &IssueRequest) -> Result<(), RelayError> {
        self.sender
            .send(request.clone())
            .await
            .map_err(|_| RelayError::Upstream("issuer channel closed".into()))
    }
}

#[derive(Clone)]
pub struct IssuanceService {
    sessions: SessionDirectory,
    correlation: CorrelationStore,
    gateway: Arc<dyn IssuerGateway>,
    subscriber_token: Option<String>,
}

impl IssuanceService {
    /// `subscriber_token` is attached to every request so the issuer's result
    /// fans out to that subscriber's callback.
    pub fn new(
        sessions: SessionDirectory,
        correlation: CorrelationStore,
        gateway: Arc<dyn IssuerGateway>,
        subscriber_token: Option<String>,
    ) -> Self {
        Self {
            sessions,
            correlation,
            gateway,
            subscriber_token,
        }
    }

    /// Starts a card request for a registered session and returns the request
    /// token the result will carry.
    #[instrument(skip(self))]
    pub async fn request_card(
        &self,
        session_token: &str,
        card_type: &str,
    ) -> Result<String, RelayError> {
        let card_type = card_type.trim();
        if card_type.is_empty() {
            return Err(RelayError::InvalidInput("card_type is required".into()));
        }

        let session = self.sessions.get(session_token).await?;
        let token = uuid::Uuid::new_v4().to_string();
        let pending = PendingRequest {
            token: token.clone(),
            identity: session.identity,
            card_type: card_type.to_string(),
            session_token: Some(session_token.to_string()),
        };
        self.correlation.put(&token, &pending).await?;

        let request = IssueRequest::for_pending(&pending, self.subscriber_token.as_deref());
        if let Err(e) = self.gateway.submit(&request).await {
            warn!(error = %e, request = %token, "Issuer submission failed, discarding request");
            if let Err(cleanup) = self.correlation.delete(&token).await {
                warn!(error = %cleanup, request = %token, "Pending request not cleared");
            }
            return Err(match e {
                RelayError::Upstream(_) => e,
                other => RelayError::Upstream(other.to_string()),
            });
        }

        info!(request = %token, "Card request submitted");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::NamespacedClient;
    use crate::framework::{StoreActor, TtlStore};
    use crate::model::{IdentitySnapshot, SessionRecord};

    struct Fixture {
        sessions: SessionDirectory,
        correlation: CorrelationStore,
    }

    fn fixture() -> Fixture {
        let (actor, client) = StoreActor::new(16);
        tokio::spawn(actor.run());
        let store: Arc<dyn TtlStore> = Arc::new(client);
        Fixture {
            sessions: SessionDirectory::new(store.clone()),
            correlation: CorrelationStore::new(store),
        }
    }

    async fn register(sessions: &SessionDirectory) -> String {
        sessions
            .register(&SessionRecord::new(
                IdentitySnapshot::new("Ana", "Diaz", "1990-04-02", "CO"),
                "1020304050",
            ))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_request_card_stores_and_submits() {
        let f = fixture();
        let session = register(&f.sessions).await;
        let (gateway, mut issuer) = ChannelGateway::new(4);
        let service = IssuanceService::new(
            f.sessions.clone(),
            f.correlation.clone(),
            Arc::new(gateway),
            Some("sub-1".into()),
        );

        let token = service.request_card(&session, "credit").await.unwrap();
        assert!(uuid::Uuid::parse_str(&token).is_ok());

        let pending = f.correlation.get(&token).await.unwrap();
        assert_eq!(pending.session_token.as_deref(), Some(session.as_str()));
        assert_eq!(pending.card_type, "credit");

        let sent = issuer.recv().await.unwrap();
        assert_eq!(sent.request_uuid, token);
        assert_eq!(sent.suscriptor_token, "sub-1");
        assert_eq!(sent.session_token.as_deref(), Some(session.as_str()));
        assert_eq!(sent.name, "Ana");
    }

    #[tokio::test]
    async fn test_rejects_blank_card_type_and_unknown_session() {
        let f = fixture();
        let (gateway, _issuer) = ChannelGateway::new(4);
        let service = IssuanceService::new(f.sessions, f.correlation, Arc::new(gateway), None);

        assert!(matches!(
            service.request_card("whatever", "  ").await,
            Err(RelayError::InvalidInput(_))
        ));
        assert!(service
            .request_card("no-such-session", "debit")
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_failed_submission_discards_pending_entry() {
        let f = fixture();
        let session = register(&f.sessions).await;
        let (gateway, issuer) = ChannelGateway::new(4);
        drop(issuer);
        let service = IssuanceService::new(
            f.sessions.clone(),
            f.correlation.clone(),
            Arc::new(gateway),
            None,
        );

        let err = service.request_card(&session, "credit").await.unwrap_err();
        assert_eq!(err, RelayError::Upstream("issuer channel closed".into()));

        let keys = f
            .correlation
            .store()
            .keys("request:".into())
            .await
            .unwrap();
        assert!(keys.is_empty());
    }

    #[tokio::test]
    async fn test_http_gateway_gives_up_on_stalled_issuer() {
        // Accepts the connection and never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
        });

        let gateway = HttpIssuerGateway::new(reqwest::Client::new(), format!("http://{addr}/issue"))
            .with_timeout(Duration::from_millis(200));
        let pending = PendingRequest {
            token: "r-1".into(),
            identity: IdentitySnapshot::new("Ana", "Diaz", "1990-04-02", "CO"),
            card_type: "credit".into(),
            session_token: None,
        };

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            gateway.submit(&IssueRequest::for_pending(&pending, None)),
        )
        .await
        .expect("submit did not honor its timeout");
        assert!(matches!(outcome, Err(RelayError::Upstream(_))));
    }
}
