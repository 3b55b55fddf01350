//! Relay configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Log output format for [`setup_tracing`](crate::lifecycle::setup_tracing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Compact human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Tunables for every relay component.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    /// How long a pending request waits for its result.
    pub request_ttl: Duration,
    /// How long a registered session stays resolvable.
    pub session_ttl: Duration,
    /// `None` keeps subscriptions forever.
    pub subscriber_ttl: Option<Duration>,
    /// `None` lets live sessions wait indefinitely.
    pub live_idle_timeout: Option<Duration>,
    pub webhook_timeout: Duration,
    /// Scan sessions by name when a result carries no session token.
    pub identity_scan_fallback: bool,
    pub dead_letter_capacity: usize,
    /// Channel capacity of the in-process store actor.
    pub store_buffer: usize,
    pub store_sweep_interval: Duration,
    /// `source` field of outgoing webhook envelopes.
    pub event_source: String,
    /// When set, card requests are POSTed here instead of an in-process issuer.
    pub issuer_url: Option<String>,
    pub issuer_timeout: Duration,
    /// Subscriber attached to outgoing card requests.
    pub subscriber_token: Option<String>,
    pub log_format: LogFormat,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            request_ttl: Duration::from_secs(86_400),
            session_ttl: Duration::from_secs(86_400),
            subscriber_ttl: None,
            live_idle_timeout: Some(Duration::from_secs(300)),
            webhook_timeout: Duration::from_millis(5_000),
            identity_scan_fallback: true,
            dead_letter_capacity: 256,
            store_buffer: 64,
            store_sweep_interval: Duration::from_secs(60),
            event_source: "webhook-service".to_string(),
            issuer_url: None,
            issuer_timeout: Duration::from_millis(10_000),
            subscriber_token: None,
            log_format: LogFormat::Text,
        }
    }
}

impl RelayConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `RELAY_REQUEST_TTL_SECS`: Pending request TTL (default: 86400)
    /// - `RELAY_SESSION_TTL_SECS`: Session TTL (default: 86400)
    /// - `RELAY_SUBSCRIBER_TTL_SECS`: Subscriber TTL, `0` or unset for none (default: none)
    /// - `RELAY_LIVE_IDLE_TIMEOUT_SECS`: Live session idle timeout, `0` for none (default: 300)
    /// - `RELAY_WEBHOOK_TIMEOUT_MS`: Webhook attempt timeout (default: 5000)
    /// - `RELAY_IDENTITY_SCAN`: Enable the identity scan fallback (default: true)
    /// - `RELAY_DEAD_LETTER_CAPACITY`: Dead letters kept in memory (default: 256)
    /// - `RELAY_STORE_BUFFER`: Store actor channel capacity (default: 64)
    /// - `RELAY_STORE_SWEEP_SECS`: Expired key sweep interval (default: 60)
    /// - `RELAY_EVENT_SOURCE`: Webhook `source` field (default: webhook-service)
    /// - `ISSUER_URL`: HTTP issuer endpoint (default: in-process issuer)
    /// - `RELAY_ISSUER_TIMEOUT_MS`: HTTP issuer request timeout (default: 10000)
    /// - `SUSCRIPTOR_TOKEN`: Subscriber attached to card requests (default: none)
    /// - `RELAY_LOG_FORMAT`: `text` or `json` (default: text)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading from `lookup` instead.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| parse::<u64>(&v));
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            request_ttl: parsed("RELAY_REQUEST_TTL_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_ttl),

            session_ttl: parsed("RELAY_SESSION_TTL_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.session_ttl),

            subscriber_ttl: match parsed("RELAY_SUBSCRIBER_TTL_SECS") {
                Some(0) | None => None,
                Some(secs) => Some(Duration::from_secs(secs)),
            },

            live_idle_timeout: match parsed("RELAY_LIVE_IDLE_TIMEOUT_SECS") {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => defaults.live_idle_timeout,
            },

            webhook_timeout: parsed("RELAY_WEBHOOK_TIMEOUT_MS")
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.webhook_timeout),

            identity_scan_fallback: lookup("RELAY_IDENTITY_SCAN")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(defaults.identity_scan_fallback),

            dead_letter_capacity: lookup("RELAY_DEAD_LETTER_CAPACITY")
                .and_then(|v| parse(&v))
                .unwrap_or(defaults.dead_letter_capacity),

            store_buffer: lookup("RELAY_STORE_BUFFER")
                .and_then(|v| parse(&v))
                .filter(|n| *n > 0)
                .unwrap_or(defaults.store_buffer),

            store_sweep_interval: parsed("RELAY_STORE_SWEEP_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.store_sweep_interval),

            event_source: optional("RELAY_EVENT_SOURCE").unwrap_or(defaults.event_source),

            issuer_url: optional("ISSUER_URL"),

            issuer_timeout: parsed("RELAY_ISSUER_TIMEOUT_MS")
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.issuer_timeout),

            subscriber_token: optional("SUSCRIPTOR_TOKEN"),

            log_format: match lookup("RELAY_LOG_FORMAT") {
                Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
        }
    }
}

fn parse<T: FromStr>(raw: &str) -> Option<T> {
    raw.trim().parse().ok()
}
