//! Ephemeral key-value substrate for in-flight relay state.
//!
//! # Main Components
//!
//! - [`TtlStore`] - Async contract for set-with-expiry, get, delete and prefix scans
//! - [`StoreActor`] - In-process store running in its own Tokio task
//! - [`StoreClient`] - Cloneable handle implementing [`TtlStore`] over a channel
//! - [`StoreError`] - Transport failures, surfaced upstream as "store unavailable"
//!
//! # Testing
//!
//! See [`mock`] module for utilities to script store replies without running an actor.

pub mod core;
pub mod mock;

// Re-export core types for convenience
pub use core::*;
