//! Webhook fan-out to subscriber callbacks.
//!
//! [`WebhookNotifier`] spawns one bounded attempt per result. Failures end up
//! in the [`DeadLetterLog`]; nothing is retried.

pub mod dead_letter;
pub mod notifier;
pub mod transport;

pub use dead_letter::{DeadLetter, DeadLetterLog};
pub use notifier::{DeliveryOutcome, WebhookNotifier};
pub use transport::{CallbackTransport, HttpTransport, RecordingTransport};
