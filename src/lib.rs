//! # Card Relay
//!
//! > **Correlating asynchronous card-issuance results with the clients waiting for them.**
//!
//! A client asks for a card. The issuer decides later, somewhere else, and calls back
//! with the outcome. By then the client may be connected on a live stream, may have
//! gone away, or may have opened a second tab. This crate ties the late result back to
//! the right party and lets every piece of in-flight state expire on its own.
//!
//! ## 🏗️ Design Philosophy
//!
//! ### Three coupled mechanisms
//! - **Correlation store**: pending request context under an opaque request token, with a TTL.
//! - **Subscriber registry**: callback URLs under unguessable subscriber tokens.
//! - **Live-connection registry**: at most one real-time channel per end user, with
//!   non-blocking, best-effort push.
//!
//! ### Best effort, explicitly
//! Live pushes never block and never queue more than one result. Webhooks get one
//! attempt with a timeout, and failures go to a dead-letter log. Neither can fail the
//! dispatch that triggered it.
//!
//! ## 👩‍💻 Architecture Notes
//!
//! ### 1. Store behind a trait
//! All correlation, subscriber and session state lives behind [`TtlStore`](framework::TtlStore).
//! The crate ships an in-process actor implementation; a networked store plugs in by
//! implementing the trait. Multi-key sequences are never atomic, so a session that
//! disappears between two calls is an ordinary "not found".
//!
//! ### 2. One lock, no I/O under it
//! The [`LiveRegistry`](live::LiveRegistry) is the only shared in-process mutable state.
//! Its single `RwLock` is never held across an `.await`.
//!
//! ### 3. Session token end-to-end
//! The session token rides on the pending request and the issuer echoes it back. The
//! name-based session scan survives only as a fallback that can be switched off, and it
//! refuses to guess between two matches.
//!
//! ### 4. Observability
//! `tracing` everywhere with structured fields. See [`lifecycle::tracing`].
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Substrate ([`framework`])
//! - **Role**: TTL key-value store contract plus an actor-based implementation.
//! - **Key items**: [`TtlStore`](framework::TtlStore), [`StoreActor`](framework::StoreActor).
//!
//! ### 2. The Interface ([`clients`])
//! - **Role**: One typed client per key namespace.
//! - **Key items**: [`CorrelationStore`](clients::CorrelationStore),
//!   [`SubscriberRegistry`](clients::SubscriberRegistry),
//!   [`SessionDirectory`](clients::SessionDirectory).
//!
//! ### 3. The Core ([`resolver`], [`live`], [`dispatcher`], [`webhook`])
//! - **Role**: Identity recovery, real-time delivery, result orchestration and callback fan-out.
//! - **Key items**: [`ResultDispatcher`](dispatcher::ResultDispatcher),
//!   [`LiveRegistry`](live::LiveRegistry), [`WebhookNotifier`](webhook::WebhookNotifier).
//!
//! ### 4. The Edges ([`issuance`], [`records`])
//! - **Role**: Submitting requests to the issuer and persisting terminal outcomes.
//!
//! ### 5. The Orchestrator ([`lifecycle`])
//! - **Role**: Builds and wires everything from a [`RelayConfig`](config::RelayConfig).
//! - **Key items**: [`RelaySystem`](lifecycle::RelaySystem).
//!
//! ## 🚀 Quick Start
//!
//! ```bash
//! # Run the demo flow with an in-process issuer
//! RUST_LOG=info cargo run
//!
//! # JSON logs
//! RELAY_LOG_FORMAT=json cargo run
//! ```
//!
//! ### Running Tests
//!
//! ```bash
//! cargo test
//! ```

pub mod clients;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod framework;
pub mod issuance;
pub mod lifecycle;
pub mod live;
pub mod model;
pub mod records;
pub mod resolver;
pub mod webhook;

pub use error::RelayError;
