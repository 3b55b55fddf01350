//! Lifecycle management: building, wiring and tearing down the relay.

pub mod relay_system;
pub mod tracing;

pub use relay_system::RelaySystem;
pub use self::tracing::setup_tracing;
