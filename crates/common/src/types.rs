use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a host-native object in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Short prefix used in log lines.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

/// Where an object stands in the world. Pets only ever copy their owner's location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
}

impl Location {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}

impl Default for Location {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
        }
    }
}

/// Host binary revision tag, e.g. `v1_6_R3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HostRevision {
    pub major: u16,
    pub minor: u16,
    pub release: u16,
}

impl HostRevision {
    pub const fn new(major: u16, minor: u16, release: u16) -> Self {
        Self {
            major,
            minor,
            release,
        }
    }

    /// Package segment used by the host for versioned class names.
    pub fn package(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for HostRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}_{}_R{}", self.major, self.minor, self.release)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("malformed host revision {0:?}, expected e.g. v1_6_R3")]
pub struct RevisionParseError(pub String);

impl FromStr for HostRevision {
    type Err = RevisionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || RevisionParseError(s.to_string());
        let rest = s.strip_prefix('v').ok_or_else(bad)?;
        let mut parts = rest.split('_');
        let major = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
        let minor = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
        let release = parts
            .next()
            .and_then(|p| p.strip_prefix('R'))
            .and_then(|p| p.parse().ok())
            .ok_or_else(bad)?;
        if parts.next().is_some() {
            return Err(bad());
        }
        Ok(Self::new(major, minor, release))
    }
}
