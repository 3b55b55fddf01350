//! Live-connection registry: one real-time channel per end user.
//!
//! - [`LiveRegistry`] - shared map from identity to a single-slot channel
//! - [`LiveSession`] - the waiting side of one connection
//! - [`stream`] - renders a session as server-sent events

pub mod registry;
pub mod session;
pub mod stream;

pub use registry::{CloseOutcome, LiveRegistry, PushOutcome};
pub use session::{LiveSession, SessionOutcome};
pub use stream::StreamFrame;
