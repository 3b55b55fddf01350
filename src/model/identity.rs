use serde::{Deserialize, Serialize};

/// Identity fields captured when a session is registered and copied onto every
/// pending request it starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySnapshot {
    pub name: String,
    pub lastname: String,
    pub birth_date: String,
    pub country_code: String,
}

impl IdentitySnapshot {
    pub fn new(
        name: impl Into<String>,
        lastname: impl Into<String>,
        birth_date: impl Into<String>,
        country_code: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            lastname: lastname.into(),
            birth_date: birth_date.into(),
            country_code: country_code.into(),
        }
    }

    /// The pair the identity scan compares on. It is not a unique key.
    pub fn same_person(&self, other: &IdentitySnapshot) -> bool {
        self.name == other.name && self.lastname == other.lastname
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.name, self.lastname)
    }
}

/// A registered end-user session, stored under `session:<token>`.
///
/// The session token is the identity key of the live-connection registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(flatten)]
    pub identity: IdentitySnapshot,
    pub citizen_id: String,
}

impl SessionRecord {
    pub fn new(identity: IdentitySnapshot, citizen_id: impl Into<String>) -> Self {
        Self {
            identity,
            citizen_id: citizen_id.into(),
        }
    }
}
