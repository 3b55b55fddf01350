use crate::error::RelayError;
use crate::model::WebhookEvent;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Delivers a webhook envelope to a callback URL and reports the HTTP status.
///
/// Implementations must not retry. Time limits are applied by the caller.
#[async_trait]
pub trait CallbackTransport: Send + Sync {
    async fn post_json(&self, url: &str, event: &WebhookEvent) -> Result<u16, RelayError>;
}

/// POSTs the envelope as JSON with a shared `reqwest::Client`.
#[derive(Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CallbackTransport for HttpTransport {
    async fn post_json(&self, url: &str, event: &WebhookEvent) -> Result<u16, RelayError> {
        let response = self
            .client
            .post(url)
            .json(event)
            .send()
            .await
            .map_err(|e| RelayError::Upstream(format!("POST {url}: {e}")))?;
        Ok(response.status().as_u16())
    }
}

/// In-memory transport that records every POST and answers with a scripted
/// status, delay or failure.
#[derive(Clone)]
pub struct RecordingTransport {
    posts: Arc<Mutex<Vec<(String, WebhookEvent)>>>,
    status: u16,
    delay: Option<Duration>,
    failure: Option<String>,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingTransport {
    /// Answers every POST with `200`.
    pub fn new() -> Self {
        Self {
            posts: Arc::new(Mutex::new(Vec::new())),
            status: 200,
            delay: None,
            failure: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Sleeps before answering, to exercise timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fails every POST as if the connection was refused.
    pub fn failing(mut self, reason: impl Into<String>) -> Self {
        self.failure = Some(reason.into());
        self
    }

    /// Every `(url, event)` posted so far, in order.
    pub fn posts(&self) -> Vec<(String, WebhookEvent)> {
        self.posts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl CallbackTransport for RecordingTransport {
    async fn post_json(&self, url: &str, event: &WebhookEvent) -> Result<u16, RelayError> {
        self.posts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((url.to_string(), event.clone()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.failure {
            Some(reason) => Err(RelayError::Upstream(reason.clone())),
            None => Ok(self.status),
        }
    }
}
