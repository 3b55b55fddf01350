//! Domain-specific clients over the TTL store.
//!
//! Each client owns one key namespace and hides the raw string protocol of
//! [`TtlStore`](crate::framework::TtlStore) behind typed records.

pub mod correlation_client;
pub mod namespaced;
pub mod session_client;
pub mod subscriber_client;

pub use correlation_client::*;
pub use namespaced::NamespacedClient;
pub use session_client::*;
pub use subscriber_client::*;

use rand::rngs::OsRng;
use rand::RngCore;

/// 16 bytes from the OS RNG, hex-encoded. Used for bearer tokens.
pub(crate) fn random_token() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
