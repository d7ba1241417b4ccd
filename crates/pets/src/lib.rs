//! Pets: cosmetic companion creatures bound to one owner each.
//!
//! [`EntityTypeRegistry`] points the host's creature type tables at the pet
//! classes, [`PetStateMachine`] keeps one live object's observable state in
//! step with its packed payload, and [`PetManager`] owns the owner to pet
//! map. [`PetContext`] wires these to storage and the host callbacks.
//!
//! # Invariants
//! - At most one live pet per owner.
//! - Every pet object is constructed from a class this registry registered
//!   for the running host revision.
//! - A failed construction leaves no partial object in the world and no
//!   entry in the manager.
//! - A pet's payload only ever holds values valid for its species' layout.

pub mod config;
pub mod context;
pub mod error;
pub mod manager;
pub mod registry;
pub mod species;
pub mod state;

pub use config::{ConfigError, PetConfig, UpdateConfig};
pub use context::{PetContext, PetStatus, ShutdownReport};
pub use error::PetError;
pub use manager::{ActivePet, Host, PetManager, READY_DELAY_TICKS, SweepFailure, SweepReport};
pub use registry::EntityTypeRegistry;
pub use species::Sounds;
pub use state::PetStateMachine;
