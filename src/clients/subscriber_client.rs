use crate::clients::namespaced::NamespacedClient;
use crate::clients::random_token;
use crate::error::RelayError;
use crate::framework::{SetMode, TtlStore};
use crate::model::Subscriber;
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

/// Maps subscriber tokens to callback URLs under `subscriber:<token>`.
///
/// Subscriptions never expire unless a TTL is configured. There is no
/// revocation.
#[derive(Clone)]
pub struct SubscriberRegistry {
    store: Arc<dyn TtlStore>,
    ttl: Option<Duration>,
}

impl NamespacedClient for SubscriberRegistry {
    type Record = Subscriber;
    const NAMESPACE: &'static str = "subscriber:";

    fn store(&self) -> &Arc<dyn TtlStore> {
        &self.store
    }
}

impl SubscriberRegistry {
    pub fn new(store: Arc<dyn TtlStore>, ttl: Option<Duration>) -> Self {
        Self { store, ttl }
    }

    /// Registers a callback and returns a fresh 128-bit hex token.
    ///
    /// Subscribing the same URL twice yields two independent tokens.
    #[instrument(skip(self))]
    pub async fn subscribe(&self, name: &str, callback_url: &str) -> Result<String, RelayError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RelayError::InvalidInput("subscriber name is blank".into()));
        }
        validate_callback(callback_url)?;

        let subscriber = Subscriber {
            token: random_token(),
            name: name.to_string(),
            callback_url: callback_url.to_string(),
        };
        let written = self
            .write(&subscriber.token, &subscriber, self.ttl, SetMode::IfAbsent)
            .await?;
        if !written {
            return Err(RelayError::DuplicateToken(subscriber.token));
        }

        info!(ttl = ?self.ttl, "Subscriber registered");
        Ok(subscriber.token)
    }

    #[instrument(skip(self))]
    pub async fn resolve(&self, token: &str) -> Result<Subscriber, RelayError> {
        self.read(token)
            .await?
            .ok_or_else(|| RelayError::not_found(Self::key_for(token)))
    }
}

fn validate_callback(callback_url: &str) -> Result<(), RelayError> {
    let url = Url::parse(callback_url)
        .map_err(|e| RelayError::InvalidInput(format!("callback url {callback_url:?}: {e}")))?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(()),
        _ => Err(RelayError::InvalidInput(format!(
            "callback url {callback_url:?} must be an absolute http(s) url"
        ))),
    }
}
