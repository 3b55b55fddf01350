//! # Observability & Tracing
//!
//! [`setup_tracing`] installs the global `tracing` subscriber once at startup.
//!
//! ## Configuration
//!
//! - **Level filter** comes from `RUST_LOG` and falls back to `info`.
//! - **Text format** is compact and hides the module prefix (`with_target(false)`),
//!   which keeps lines short during development.
//! - **JSON format** (`RELAY_LOG_FORMAT=json`) emits one object per event for log
//!   shippers.
//!
//! ## Usage Examples
//!
//! ```bash
//! # Compact logs (default)
//! RUST_LOG=info cargo run
//!
//! # Show full payloads at function entry points
//! RUST_LOG=debug cargo run
//!
//! # Only the live registry, verbosely
//! RUST_LOG=card_relay::live=trace cargo run
//! ```
//!
//! ## What Gets Traced
//!
//! Every component logs with structured fields rather than formatted strings:
//!
//! ```text
//! INFO request_card: Pending request stored ttl_secs=86400
//! INFO request_card: Card request submitted request=7f1c...
//! INFO dispatch: Result dispatched identity=3a9e... resolution=Direct live=Delivered cleaned_up=true
//! INFO webhook: Webhook delivered url=https://acme.example/cb
//! ```
//!
//! Best-effort outcomes (`NoConnection`, `Dropped`) log at debug and info.
//! Failed webhooks log at warn. Nothing on the live path logs at error.

use crate::config::LogFormat;
use tracing_subscriber::EnvFilter;

pub fn setup_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(false)
            .init(),
    }
}
