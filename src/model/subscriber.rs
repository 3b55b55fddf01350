use serde::{Deserialize, Serialize};

/// A webhook subscriber, stored under `subscriber:<token>`.
///
/// Immutable once written. The token is a bearer secret: anyone holding it
/// receives that subscriber's results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    pub token: String,
    pub name: String,
    pub callback_url: String,
}
