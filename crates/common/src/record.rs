use crate::layout::LayoutError;
use crate::species::PetSpecies;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of one pet's customizable state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetConfiguration {
    pub species: PetSpecies,
    pub name: Option<String>,
    /// Packed field values, laid out per [`PetSpecies::layout`].
    pub payload: i64,
    pub rider: Option<RiderConfiguration>,
}

/// A second pet mounted on the first. Riders cannot carry riders of their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiderConfiguration {
    pub species: PetSpecies,
    pub name: Option<String>,
    pub payload: i64,
}

impl PetConfiguration {
    /// Default configuration for a species: no name, default payload, no rider.
    pub fn new(species: PetSpecies) -> Self {
        Self {
            species,
            name: None,
            payload: species.default_payload(),
            rider: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_rider(mut self, rider: RiderConfiguration) -> Self {
        self.rider = Some(rider);
        self
    }

    /// Switch species. The payload is reset to the new species' default so it
    /// never carries bits laid out for the old one.
    pub fn switch_species(&mut self, species: PetSpecies) {
        self.species = species;
        self.payload = species.default_payload();
    }

    /// Verify the payloads of the pet and its rider.
    pub fn validate(&self) -> Result<(), LayoutError> {
        self.species.validate_payload(self.payload)?;
        if let Some(rider) = &self.rider {
            rider.validate()?;
        }
        Ok(())
    }
}

impl RiderConfiguration {
    pub fn new(species: PetSpecies) -> Self {
        Self {
            species,
            name: None,
            payload: species.default_payload(),
        }
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        self.species.validate_payload(self.payload)
    }

    /// View the rider as a stand-alone configuration (used to spawn it).
    pub fn as_pet(&self) -> PetConfiguration {
        PetConfiguration {
            species: self.species,
            name: self.name.clone(),
            payload: self.payload,
            rider: None,
        }
    }
}

impl From<PetConfiguration> for RiderConfiguration {
    /// Demote a configuration to a rider, dropping any rider it carried.
    fn from(config: PetConfiguration) -> Self {
        Self {
            species: config.species,
            name: config.name,
            payload: config.payload,
        }
    }
}

/// What the store remembers for an owner: the last known pet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRecord {
    pub pet: PetConfiguration,
    /// Wall-clock time of the write; decides between diverging backends.
    pub saved_at: DateTime<Utc>,
}

impl OwnerRecord {
    pub fn new(pet: PetConfiguration) -> Self {
        Self {
            pet,
            saved_at: Utc::now(),
        }
    }

    pub fn at(pet: PetConfiguration, saved_at: DateTime<Utc>) -> Self {
        Self { pet, saved_at }
    }

    pub fn is_newer_than(&self, other: &OwnerRecord) -> bool {
        self.saved_at > other.saved_at
    }
}
