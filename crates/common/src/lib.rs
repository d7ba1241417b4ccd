//! Shared types for petkeeper: identities, species, field layouts and the
//! records that flow between the live manager and the stores.

pub mod identity;
pub mod layout;
pub mod record;
pub mod species;
pub mod types;

pub use identity::OwnerIdentity;
pub use layout::{FieldDomain, FieldSpec, LayoutError, PetField};
pub use record::{OwnerRecord, PetConfiguration, RiderConfiguration};
pub use species::{PetSpecies, SizeCategory, UnknownSpecies};
pub use types::{EntityId, HostRevision, Location, RevisionParseError};
