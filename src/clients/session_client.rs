use crate::clients::namespaced::NamespacedClient;
use crate::clients::random_token;
use crate::error::RelayError;
use crate::framework::{SetMode, TtlStore};
use crate::model::SessionRecord;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Registered end-user sessions under `session:<token>`.
///
/// The session token identifies the end user everywhere else: it keys the live
/// connection registry and the terminal records.
#[derive(Clone)]
pub struct SessionDirectory {
    store: Arc<dyn TtlStore>,
    ttl: Duration,
}

impl NamespacedClient for SessionDirectory {
    type Record = SessionRecord;
    const NAMESPACE: &'static str = "session:";

    fn store(&self) -> &Arc<dyn TtlStore> {
        &self.store
    }
}

impl SessionDirectory {
    pub fn new(store: Arc<dyn TtlStore>) -> Self {
        Self::with_ttl(store, DEFAULT_SESSION_TTL)
    }

    pub fn with_ttl(store: Arc<dyn TtlStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    #[instrument(skip(self, record), fields(name = %record.identity.full_name()))]
    pub async fn register(&self, record: &SessionRecord) -> Result<String, RelayError> {
        validate(record)?;

        let token = random_token();
        let written = self
            .write(&token, record, Some(self.ttl), SetMode::IfAbsent)
            .await?;
        if !written {
            return Err(RelayError::DuplicateToken(token));
        }

        info!("Session registered");
        Ok(token)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, token: &str) -> Result<SessionRecord, RelayError> {
        self.read(token)
            .await?
            .ok_or_else(|| RelayError::not_found(Self::key_for(token)))
    }

    /// Lists every live session, sorted by token.
    ///
    /// Keys and values are fetched in separate round trips, so a session that
    /// expires or is removed in between is skipped rather than reported. So is a
    /// session whose stored value no longer decodes.
    #[instrument(skip(self))]
    pub async fn scan(&self) -> Result<Vec<(String, SessionRecord)>, RelayError> {
        let mut keys = self.store.keys(Self::NAMESPACE.to_string()).await?;
        keys.sort();

        let mut sessions = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(token) = Self::token_of(&key) else {
                continue;
            };
            match self.read(token).await {
                Ok(Some(record)) => sessions.push((token.to_string(), record)),
                Ok(None) => debug!(%token, "Session vanished during scan"),
                Err(RelayError::Corrupt { key, reason }) => {
                    warn!(%key, %reason, "Unreadable session skipped during scan");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(sessions)
    }
}

fn validate(record: &SessionRecord) -> Result<(), RelayError> {
    let identity = &record.identity;
    if identity.name.trim().is_empty() || identity.lastname.trim().is_empty() {
        return Err(RelayError::InvalidInput("name and lastname are required".into()));
    }
    if record.citizen_id.is_empty() || !record.citizen_id.chars().all(|c| c.is_ascii_digit()) {
        return Err(RelayError::InvalidInput(
            "citizen_id must contain only digits".into(),
        ));
    }
    Ok(())
}
