use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical pet type. Each species overrides exactly one vanilla creature kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PetSpecies {
    Blaze,
    Creeper,
    Ocelot,
    Pig,
    Sheep,
    Skeleton,
    Slime,
    Wolf,
    Zombie,
}

/// Coarse collision/visual scale class derived from a pet's current fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SizeCategory {
    Tiny,
    Regular,
    Large,
    Giant,
}

impl PetSpecies {
    pub const ALL: [PetSpecies; 9] = [
        Self::Blaze,
        Self::Creeper,
        Self::Ocelot,
        Self::Pig,
        Self::Sheep,
        Self::Skeleton,
        Self::Slime,
        Self::Wolf,
        Self::Zombie,
    ];

    /// Stable lowercase key used in storage and on the command surface.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blaze => "blaze",
            Self::Creeper => "creeper",
            Self::Ocelot => "ocelot",
            Self::Pig => "pig",
            Self::Sheep => "sheep",
            Self::Skeleton => "skeleton",
            Self::Slime => "slime",
            Self::Wolf => "wolf",
            Self::Zombie => "zombie",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Blaze => "Blaze Pet",
            Self::Creeper => "Creeper Pet",
            Self::Ocelot => "Ocelot Pet",
            Self::Pig => "Pig Pet",
            Self::Sheep => "Sheep Pet",
            Self::Skeleton => "Skeleton Pet",
            Self::Slime => "Slime Pet",
            Self::Wolf => "Wolf Pet",
            Self::Zombie => "Zombie Pet",
        }
    }

    /// Name of the vanilla creature kind in the host's type tables.
    pub fn host_name(self) -> &'static str {
        match self {
            Self::Blaze => "Blaze",
            Self::Creeper => "Creeper",
            Self::Ocelot => "Ozelot",
            Self::Pig => "Pig",
            Self::Sheep => "Sheep",
            Self::Skeleton => "Skeleton",
            Self::Slime => "Slime",
            Self::Wolf => "Wolf",
            Self::Zombie => "Zombie",
        }
    }

    /// Numeric id the host uses for the creature kind.
    pub fn registration_id(self) -> i32 {
        match self {
            Self::Creeper => 50,
            Self::Skeleton => 51,
            Self::Zombie => 54,
            Self::Slime => 55,
            Self::Blaze => 61,
            Self::Pig => 90,
            Self::Sheep => 91,
            Self::Wolf => 95,
            Self::Ocelot => 98,
        }
    }

    pub fn default_size(self) -> SizeCategory {
        SizeCategory::Regular
    }

    /// Vanilla hitbox (width, height) before any size adjustment.
    pub fn base_dimensions(self) -> (f32, f32) {
        match self {
            Self::Blaze => (0.6, 1.8),
            Self::Creeper => (0.6, 1.7),
            Self::Ocelot => (0.6, 0.8),
            Self::Pig => (0.9, 0.9),
            Self::Sheep => (0.9, 1.3),
            Self::Skeleton => (0.6, 1.8),
            Self::Slime => (0.5, 0.5),
            Self::Wolf => (0.6, 0.8),
            Self::Zombie => (0.6, 1.8),
        }
    }
}

impl fmt::Display for PetSpecies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown pet species {0:?}")]
pub struct UnknownSpecies(pub String);

impl FromStr for PetSpecies {
    type Err = UnknownSpecies;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|species| species.as_str() == wanted)
            .ok_or_else(|| UnknownSpecies(s.to_string()))
    }
}
