use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Key identifying a pet owner across sessions.
///
/// Legacy data is keyed by display name, which players can change or reuse.
/// Current data is keyed by the player's stable unique id. Both render to a
/// plain string key so they can share one column or one YAML section.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OwnerIdentity {
    Name(String),
    Unique(Uuid),
}

impl OwnerIdentity {
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    pub fn unique(id: Uuid) -> Self {
        Self::Unique(id)
    }

    /// Parse a stored key. Anything that is a valid UUID is a unique id;
    /// player names can never parse as one.
    pub fn parse(key: &str) -> Self {
        match Uuid::parse_str(key) {
            Ok(id) => Self::Unique(id),
            Err(_) => Self::Name(key.to_string()),
        }
    }

    /// Storage key (hyphenated UUID or the raw name).
    pub fn key(&self) -> String {
        match self {
            Self::Name(name) => name.clone(),
            Self::Unique(id) => id.hyphenated().to_string(),
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::Name(_))
    }

    pub fn legacy_name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            Self::Unique(_) => None,
        }
    }
}

impl fmt::Display for OwnerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl From<String> for OwnerIdentity {
    fn from(key: String) -> Self {
        Self::parse(&key)
    }
}

impl From<OwnerIdentity> for String {
    fn from(owner: OwnerIdentity) -> Self {
        owner.key()
    }
}
